//! JSON Schema 2020-12 nodes as used by OpenAPI 3.1.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of component references.
pub const COMPONENT_PREFIX: &str = "#/components/schemas/";

/// Type keyword: a single type or a type array.
///
/// Nullable types are `"type": ["string", "null"]` rather than the
/// OpenAPI 3.0 `nullable: true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TypeArray {
    Single(String),
    Array(Vec<String>),
}

impl TypeArray {
    pub fn single(ty: impl Into<String>) -> Self {
        Self::Single(ty.into())
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Single(ty) => ty == "null",
            Self::Array(types) => types.iter().any(|t| t == "null"),
        }
    }

    /// Add `null` to the type set. Idempotent.
    pub fn make_nullable(self) -> Self {
        match self {
            Self::Single(ty) if ty == "null" => Self::Single(ty),
            Self::Single(ty) => Self::Array(vec![ty, "null".to_string()]),
            Self::Array(mut types) => {
                if !types.iter().any(|t| t == "null") {
                    types.push("null".to_string());
                }
                Self::Array(types)
            }
        }
    }
}

/// A schema node.
///
/// Maps are ordered so that compiling the same types twice serializes to
/// the same bytes.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<TypeArray>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,

    // String constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    // Number constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    // Array constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    // Object constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    // Composition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,
}

/// Discriminator for polymorphism
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discriminator {
    #[serde(rename = "propertyName")]
    pub property_name: String,

    /// Discriminator value to component reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<BTreeMap<String, String>>,
}

impl Schema {
    /// The empty schema, accepting any value.
    pub fn any() -> Self {
        Self::default()
    }

    fn typed(ty: &str) -> Self {
        Self {
            schema_type: Some(TypeArray::single(ty)),
            ..Default::default()
        }
    }

    pub fn string() -> Self {
        Self::typed("string")
    }

    pub fn number() -> Self {
        Self::typed("number")
    }

    pub fn integer() -> Self {
        Self::typed("integer")
    }

    pub fn boolean() -> Self {
        Self::typed("boolean")
    }

    pub fn null() -> Self {
        Self::typed("null")
    }

    pub fn object() -> Self {
        Self::typed("object")
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::typed("array")
        }
    }

    /// An object whose values all follow `values`.
    pub fn map(values: Schema) -> Self {
        Self {
            additional_properties: Some(Box::new(values)),
            ..Self::typed("object")
        }
    }

    /// A reference to a named component.
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{COMPONENT_PREFIX}{name}")),
            ..Default::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Allow `null`.
    ///
    /// Typed schemas get `null` added to their type array; references and
    /// untyped composites are wrapped in `anyOf [schema, null]`. The empty
    /// schema already accepts null and is returned unchanged.
    pub fn nullable(mut self) -> Self {
        if let Some(ty) = self.schema_type.take() {
            self.schema_type = Some(ty.make_nullable());
            return self;
        }
        if self == Schema::any() {
            return self;
        }
        if let Some(variants) = &self.any_of {
            if variants.iter().any(|v| v.schema_type.as_ref().is_some_and(TypeArray::is_nullable)) {
                return self;
            }
        }
        Self {
            any_of: Some(vec![self, Schema::null()]),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        self.required.get_or_insert_with(Vec::new).push(name.into());
        self
    }
}
