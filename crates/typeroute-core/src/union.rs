//! Discriminated union containers.
//!
//! [`Union2`], [`Union3`] and [`Union4`] hold at most one value among their
//! variant slots. Encoding requires exactly one populated slot and flattens
//! the variant's declared discriminator into its own properties. Decoding
//! tries the variants in declared order and keeps the first one that fits.
//!
//! ```rust
//! use typeroute_core::Union2;
//!
//! let value: Union2<u32, String> = serde_json::from_str(r#""text""#).unwrap();
//! assert_eq!(value.b(), Some(&"text".to_string()));
//!
//! let empty: Union2<u32, String> = Union2::default();
//! assert!(serde_json::to_string(&empty).is_err());
//! ```

use crate::conform;
use crate::shape::{remap, Describe, TypeRef, TypeShape, UnionShape, Wire};
use serde::de::{DeserializeOwned, Error as _};
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Structural union failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnionShapeError {
    #[error("union must hold exactly one of {arity} variants, found {count}")]
    PopulatedSlots { count: usize, arity: usize },
    #[error("no matching variant")]
    NoMatchingVariant,
}

/// Index of the first variant of `shape` that accepts `value`.
///
/// A variant whose discriminator property is present with another value is
/// skipped. Otherwise the variant must structurally accept the payload.
pub fn resolve(shape: &UnionShape, value: &Value) -> Result<usize, UnionShapeError> {
    shape
        .variants()
        .iter()
        .position(|variant| accepts(variant, value))
        .ok_or(UnionShapeError::NoMatchingVariant)
}

fn accepts(variant: &TypeRef, value: &Value) -> bool {
    let shape = variant.shape();
    if let Some(declared) = shape.as_record().and_then(|r| r.discriminator_spec()) {
        if let Some(tag) = value.get(&declared.property) {
            if tag.as_str() != Some(declared.value.as_str()) {
                return false;
            }
        }
    }
    conform::check(variant, value).is_ok()
}

/// Serialize one variant with external names and its discriminator.
fn encode_variant<T: Serialize + Describe>(value: &T) -> Result<Value, serde_json::Error> {
    let ty = TypeRef::of::<T>();
    let mut encoded = remap(&ty, serde_json::to_value(value)?, Wire::Outgoing);
    if let TypeShape::Record(record) = &*ty.shape() {
        let declared = record.discriminator_spec();
        if let (Some(declared), Value::Object(entries)) = (declared, &mut encoded) {
            entries.insert(declared.property.clone(), Value::String(declared.value.clone()));
        }
    }
    Ok(encoded)
}

fn decode_variant<T: DeserializeOwned + Describe>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(remap(&TypeRef::of::<T>(), value, Wire::Incoming))
}

macro_rules! union_container {
    (
        $(#[$meta:meta])*
        $name:ident, $arity:literal;
        $($slot:tt => $ty:ident, $ctor:ident, $get:ident;)+
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name<$($ty),+>($(pub Option<$ty>),+);

        impl<$($ty),+> $name<$($ty),+> {
            $(
                pub fn $ctor(value: $ty) -> Self {
                    let mut union = Self::default();
                    union.$slot = Some(value);
                    union
                }

                pub fn $get(&self) -> Option<&$ty> {
                    self.$slot.as_ref()
                }
            )+

            /// Number of populated slots.
            pub fn populated(&self) -> usize {
                0 $(+ usize::from(self.$slot.is_some()))+
            }

            /// Index of the populated slot when exactly one is set.
            pub fn variant_index(&self) -> Option<usize> {
                if self.populated() != 1 {
                    return None;
                }
                $(
                    if self.$slot.is_some() {
                        return Some($slot);
                    }
                )+
                None
            }

            /// Fails unless exactly one slot is populated.
            pub fn check(&self) -> Result<usize, UnionShapeError> {
                self.variant_index().ok_or(UnionShapeError::PopulatedSlots {
                    count: self.populated(),
                    arity: $arity,
                })
            }
        }

        impl<$($ty),+> Default for $name<$($ty),+> {
            fn default() -> Self {
                Self($(None::<$ty>),+)
            }
        }

        impl<$($ty: Describe),+> Describe for $name<$($ty),+> {
            fn type_name() -> String {
                [$($ty::type_name()),+].join("Or")
            }

            fn shape() -> TypeShape {
                TypeShape::Union(UnionShape::new(vec![$(TypeRef::of::<$ty>()),+]))
            }
        }

        impl<$($ty: Serialize + Describe),+> Serialize for $name<$($ty),+> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.check().map_err(S::Error::custom)?;
                $(
                    if let Some(value) = &self.$slot {
                        return encode_variant(value)
                            .map_err(S::Error::custom)?
                            .serialize(serializer);
                    }
                )+
                Err(S::Error::custom(UnionShapeError::NoMatchingVariant))
            }
        }

        impl<'de, $($ty: DeserializeOwned + Describe),+> Deserialize<'de> for $name<$($ty),+> {
            fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
                let value = Value::deserialize(deserializer)?;
                let shape = UnionShape::new(vec![$(TypeRef::of::<$ty>()),+]);
                let index = resolve(&shape, &value).map_err(De::Error::custom)?;
                let mut union = Self::default();
                match index {
                    $(
                        $slot => {
                            union.$slot = Some(decode_variant(value).map_err(De::Error::custom)?);
                        }
                    )+
                    _ => return Err(De::Error::custom(UnionShapeError::NoMatchingVariant)),
                }
                Ok(union)
            }
        }
    };
}

union_container! {
    /// Two-way union container.
    Union2, 2;
    0 => A, from_a, a;
    1 => B, from_b, b;
}

union_container! {
    /// Three-way union container.
    Union3, 3;
    0 => A, from_a, a;
    1 => B, from_b, b;
    2 => C, from_c, c;
}

union_container! {
    /// Four-way union container.
    Union4, 4;
    0 => A, from_a, a;
    1 => B, from_b, b;
    2 => C, from_c, c;
    3 => D, from_d, d;
}
