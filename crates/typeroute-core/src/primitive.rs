//! Primitive kinds and their string conversions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Every scalar kind the walker classifies concretely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Char,
    String,
}

/// A raw string that could not be converted to a primitive kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {raw:?} to {kind}")]
pub struct ConversionError {
    pub kind: PrimitiveKind,
    pub raw: String,
}

impl PrimitiveKind {
    /// Rust spelling of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::I128 => "i128",
            PrimitiveKind::Isize => "isize",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::U128 => "u128",
            PrimitiveKind::Usize => "usize",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Char => "char",
            PrimitiveKind::String => "string",
        }
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
                | PrimitiveKind::Isize
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::U8
                | PrimitiveKind::U16
                | PrimitiveKind::U32
                | PrimitiveKind::U64
                | PrimitiveKind::U128
                | PrimitiveKind::Usize
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }

    /// Convert a raw parameter string into a JSON value of this kind.
    pub fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let converted = match self {
            PrimitiveKind::Bool => parse_bool(raw).map(Value::Bool),
            PrimitiveKind::I8 => number::<i8>(raw),
            PrimitiveKind::I16 => number::<i16>(raw),
            PrimitiveKind::I32 => number::<i32>(raw),
            PrimitiveKind::I64 => number::<i64>(raw),
            PrimitiveKind::I128 => number::<i128>(raw),
            PrimitiveKind::Isize => number::<isize>(raw),
            PrimitiveKind::U8 => number::<u8>(raw),
            PrimitiveKind::U16 => number::<u16>(raw),
            PrimitiveKind::U32 => number::<u32>(raw),
            PrimitiveKind::U64 => number::<u64>(raw),
            PrimitiveKind::U128 => number::<u128>(raw),
            PrimitiveKind::Usize => number::<usize>(raw),
            PrimitiveKind::F32 => float::<f32>(raw),
            PrimitiveKind::F64 => float::<f64>(raw),
            PrimitiveKind::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Value::String(c.to_string())),
                    _ => None,
                }
            }
            PrimitiveKind::String => Some(Value::String(raw.to_string())),
        };
        converted.ok_or_else(|| ConversionError {
            kind: *self,
            raw: raw.to_string(),
        })
    }

    /// Whether a JSON value is well-typed for this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PrimitiveKind::Bool => value.is_boolean(),
            PrimitiveKind::I8 => fits::<i8>(value),
            PrimitiveKind::I16 => fits::<i16>(value),
            PrimitiveKind::I32 => fits::<i32>(value),
            PrimitiveKind::I64 => fits::<i64>(value),
            PrimitiveKind::I128 => fits::<i128>(value),
            PrimitiveKind::Isize => fits::<isize>(value),
            PrimitiveKind::U8 => fits::<u8>(value),
            PrimitiveKind::U16 => fits::<u16>(value),
            PrimitiveKind::U32 => fits::<u32>(value),
            PrimitiveKind::U64 => fits::<u64>(value),
            PrimitiveKind::U128 => fits::<u128>(value),
            PrimitiveKind::Usize => fits::<usize>(value),
            PrimitiveKind::F32 | PrimitiveKind::F64 => value.is_number(),
            PrimitiveKind::Char => value
                .as_str()
                .map(|s| s.chars().count() == 1)
                .unwrap_or(false),
            PrimitiveKind::String => value.is_string(),
        }
    }

    /// JSON type name used in type-mismatch messages.
    pub fn json_type(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::F32 | PrimitiveKind::F64 => "number",
            PrimitiveKind::Char | PrimitiveKind::String => "string",
            _ => "integer",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Boolean spellings accepted in query strings, headers and cookies.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn number<T: FromStr + Serialize>(raw: &str) -> Option<Value> {
    raw.parse::<T>()
        .ok()
        .and_then(|n| serde_json::to_value(n).ok())
}

fn float<T: FromStr + Into<f64>>(raw: &str) -> Option<Value> {
    let n: f64 = raw.parse::<T>().ok()?.into();
    if n.is_finite() {
        serde_json::Number::from_f64(n).map(Value::Number)
    } else {
        None
    }
}

fn fits<T: DeserializeOwned>(value: &Value) -> bool {
    value.is_number() && serde_json::from_value::<T>(value.clone()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn converts_integers() {
        assert_eq!(PrimitiveKind::I32.convert("42"), Ok(json!(42)));
        assert_eq!(PrimitiveKind::I8.convert("-128"), Ok(json!(-128)));
        assert!(PrimitiveKind::I8.convert("128").is_err());
        assert!(PrimitiveKind::U16.convert("-1").is_err());
        assert!(PrimitiveKind::I64.convert("abc").is_err());
        assert!(PrimitiveKind::I64.convert(" 1").is_err());
    }

    #[test]
    fn converts_bool_spellings() {
        for raw in ["1", "t", "true", "TRUE", "True"] {
            assert_eq!(PrimitiveKind::Bool.convert(raw), Ok(json!(true)));
        }
        for raw in ["0", "f", "false", "FALSE"] {
            assert_eq!(PrimitiveKind::Bool.convert(raw), Ok(json!(false)));
        }
        assert!(PrimitiveKind::Bool.convert("yes").is_err());
    }

    #[test]
    fn rejects_non_finite_floats() {
        assert_eq!(PrimitiveKind::F64.convert("1.5"), Ok(json!(1.5)));
        assert!(PrimitiveKind::F64.convert("NaN").is_err());
        assert!(PrimitiveKind::F32.convert("inf").is_err());
    }

    #[test]
    fn char_requires_exactly_one() {
        assert_eq!(PrimitiveKind::Char.convert("x"), Ok(json!("x")));
        assert!(PrimitiveKind::Char.convert("").is_err());
        assert!(PrimitiveKind::Char.convert("xy").is_err());
    }

    #[test]
    fn error_reports_kind_and_raw() {
        let err = PrimitiveKind::U8.convert("300").unwrap_err();
        assert_eq!(err.to_string(), r#"cannot convert "300" to u8"#);
    }

    #[test]
    fn accepts_checks_range_and_type() {
        assert!(PrimitiveKind::U8.accepts(&json!(255)));
        assert!(!PrimitiveKind::U8.accepts(&json!(256)));
        assert!(!PrimitiveKind::I32.accepts(&json!(1.5)));
        assert!(!PrimitiveKind::I32.accepts(&json!("1")));
        assert!(PrimitiveKind::F32.accepts(&json!(1)));
        assert!(PrimitiveKind::String.accepts(&json!("")));
        assert!(!PrimitiveKind::Bool.accepts(&json!(0)));
    }

    proptest! {
        #[test]
        fn prop_i64_converts_its_display(n in any::<i64>()) {
            prop_assert_eq!(PrimitiveKind::I64.convert(&n.to_string()), Ok(json!(n)));
        }

        #[test]
        fn prop_converted_values_are_accepted(n in any::<u32>()) {
            let value = PrimitiveKind::U32.convert(&n.to_string()).unwrap();
            prop_assert!(PrimitiveKind::U32.accepts(&value));
        }
    }
}
