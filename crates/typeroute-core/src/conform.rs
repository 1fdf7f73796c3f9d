//! Structural checks of JSON values against described shapes.

use crate::shape::{TypeRef, TypeShape};
use crate::union;
use serde_json::Value;

/// First place where a value does not fit its declared shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ShapeMismatch {
    /// Location inside the checked value (`address.city`, `tags[2]`), empty at the root
    pub path: String,
    /// Machine-readable reason: `invalid_type`, `required` or `no_matching_variant`
    pub code: &'static str,
    pub message: String,
}

impl ShapeMismatch {
    fn new(path: &str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            code,
            message: message.into(),
        }
    }
}

/// Check that `value` is well-typed for `ty`.
///
/// Records must carry every field that cannot be absent; unknown
/// properties are allowed. Union values must resolve to a variant.
pub fn check(ty: &TypeRef, value: &Value) -> Result<(), ShapeMismatch> {
    walk(ty, value, "")
}

fn walk(ty: &TypeRef, value: &Value, path: &str) -> Result<(), ShapeMismatch> {
    let shape = ty.shape();
    match (&*shape, value) {
        (TypeShape::Opaque, _) => Ok(()),
        (TypeShape::Pointer(_), Value::Null) => Ok(()),
        (TypeShape::Pointer(inner), value) => walk(inner, value, path),
        (_, Value::Null) => Err(ShapeMismatch::new(
            path,
            "invalid_type",
            format!("expected {}, found null", expected(&shape)),
        )),
        (TypeShape::Primitive(kind), value) => {
            if kind.accepts(value) {
                Ok(())
            } else {
                Err(ShapeMismatch::new(
                    path,
                    "invalid_type",
                    format!("expected {}, found {}", kind.name(), json_type(value)),
                ))
            }
        }
        (TypeShape::Slice(elem), Value::Array(items)) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| walk(elem, item, &format!("{path}[{i}]"))),
        (TypeShape::Map(_, val), Value::Object(entries)) => entries
            .iter()
            .try_for_each(|(key, item)| walk(val, item, &join(path, key))),
        (TypeShape::Record(record), Value::Object(entries)) => {
            for field in record.fields() {
                let field_path = join(path, &field.name);
                match entries.get(&field.name) {
                    Some(item) => walk(&field.ty, item, &field_path)?,
                    None if field.may_be_absent() => {}
                    None => {
                        return Err(ShapeMismatch::new(
                            &field_path,
                            "required",
                            format!("missing required field '{}'", field.name),
                        ))
                    }
                }
            }
            Ok(())
        }
        (TypeShape::Union(shape), value) => union::resolve(shape, value)
            .map(|_| ())
            .map_err(|err| ShapeMismatch::new(path, "no_matching_variant", err.to_string())),
        (shape, value) => Err(ShapeMismatch::new(
            path,
            "invalid_type",
            format!("expected {}, found {}", expected(shape), json_type(value)),
        )),
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn expected(shape: &TypeShape) -> &'static str {
    match shape {
        TypeShape::Primitive(kind) => kind.json_type(),
        TypeShape::Slice(_) => "array",
        TypeShape::Map(..) | TypeShape::Record(_) => "object",
        TypeShape::Union(_) => "union variant",
        TypeShape::Pointer(_) | TypeShape::Opaque => "any value",
    }
}

/// JSON type name of a value.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Describe, FieldSpec, RecordShape};
    use serde_json::json;

    struct Address;

    impl Describe for Address {
        fn type_name() -> String {
            "Address".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .field(FieldSpec::of::<String>("city"))
                    .field(FieldSpec::of::<Option<u16>>("zip")),
            )
        }
    }

    #[test]
    fn primitives_and_nulls() {
        assert!(check(&TypeRef::of::<u8>(), &json!(7)).is_ok());
        assert_eq!(
            check(&TypeRef::of::<u8>(), &json!("7")).unwrap_err().message,
            "expected u8, found string"
        );
        assert!(check(&TypeRef::of::<Option<u8>>(), &Value::Null).is_ok());
        assert_eq!(
            check(&TypeRef::of::<String>(), &Value::Null).unwrap_err().message,
            "expected string, found null"
        );
    }

    #[test]
    fn nested_paths_are_reported() {
        let ty = TypeRef::of::<Vec<Address>>();
        let err = check(&ty, &json!([{"city": "Oslo"}, {"city": 3}])).unwrap_err();
        assert_eq!(err.path, "[1].city");

        let err = check(&ty, &json!([{"zip": 1}])).unwrap_err();
        assert_eq!(err.path, "[0].city");
        assert_eq!(err.code, "required");
        assert_eq!(err.message, "missing required field 'city'");
    }

    #[test]
    fn maps_check_values() {
        let ty = TypeRef::of::<std::collections::HashMap<String, i32>>();
        assert!(check(&ty, &json!({"a": 1, "b": 2})).is_ok());
        assert_eq!(check(&ty, &json!({"a": true})).unwrap_err().path, "a");
        assert!(check(&ty, &json!([1])).is_err());
    }

    #[test]
    fn unknown_properties_are_allowed() {
        assert!(check(&TypeRef::of::<Address>(), &json!({"city": "Rome", "x": 1})).is_ok());
    }
}
