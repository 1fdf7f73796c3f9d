//! Validation error types and JSON error format.

use crate::constraints::RuleError;
use crate::section::Section;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The section the field is read from
    pub section: Section,
    /// The field name (supports nested: "address.city")
    pub field: String,
    /// Machine-readable reason (e.g. "required", "invalid_type", "range")
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ValidationError {
    pub fn new(
        section: Section,
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            section,
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// A required field that produced no value.
    pub fn required(section: Section, field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("missing required {section} field '{field}'");
        Self::new(section, field, "required", message)
    }

    /// A raw value that could not be converted to the field's type.
    pub fn conversion(section: Section, field: impl Into<String>, raw: &str) -> Self {
        Self::new(
            section,
            field,
            "invalid_type",
            format!("invalid {section} value {raw:?}"),
        )
    }

    /// Scope a constraint violation to a field.
    pub fn from_rule(section: Section, field: impl Into<String>, rule: RuleError) -> Self {
        Self::new(section, field, rule.code, rule.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}: {}", self.section, self.message)
        } else {
            write!(f, "{}.{}: {}", self.section, self.field, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validation errors grouped by section.
///
/// Sections are reported in [`Section`] order; within a section errors keep
/// the order in which they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionErrors {
    sections: BTreeMap<Section, Vec<ValidationError>>,
}

impl SectionErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error under its own section.
    pub fn add(&mut self, error: ValidationError) {
        self.sections.entry(error.section).or_default().push(error);
    }

    /// Merge another collection into this one.
    pub fn merge(&mut self, other: SectionErrors) {
        for (section, errors) in other.sections {
            self.sections.entry(section).or_default().extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(Vec::is_empty)
    }

    /// Total number of errors across sections.
    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Errors recorded for one section.
    pub fn section(&self, section: Section) -> &[ValidationError] {
        self.sections
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Sections that have at least one error.
    pub fn sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.sections
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(section, _)| *section)
    }

    /// All errors, section by section.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.sections.values().flatten()
    }

    /// Ok if no errors were recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.sections.into_values().flatten().collect()
    }
}

impl Extend<ValidationError> for SectionErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        for error in iter {
            self.add(error);
        }
    }
}

impl FromIterator<ValidationError> for SectionErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        let mut errors = Self::new();
        errors.extend(iter);
        errors
    }
}

impl fmt::Display for SectionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request validation failed: {} error(s)", self.len())
    }
}

impl std::error::Error for SectionErrors {}

/// Internal error structure for JSON serialization.
#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    error_type: &'static str,
    message: &'static str,
    fields: Vec<&'a ValidationError>,
}

#[derive(Serialize)]
struct ErrorWrapper<'a> {
    error: ErrorBody<'a>,
}

/// Serializes to the standard error envelope:
///
/// ```json
/// {
///   "error": {
///     "type": "validation_error",
///     "message": "Request validation failed",
///     "fields": [{"section": "query", "field": "age", "code": "invalid_type", "message": "..."}]
///   }
/// }
/// ```
impl Serialize for SectionErrors {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ErrorWrapper {
            error: ErrorBody {
                error_type: "validation_error",
                message: "Request validation failed",
                fields: self.iter().collect(),
            },
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_section_in_section_order() {
        let mut errors = SectionErrors::new();
        errors.add(ValidationError::conversion(Section::Query, "age", "abc"));
        errors.add(ValidationError::required(Section::Body, "name"));
        errors.add(ValidationError::required(Section::Body, "email"));

        assert_eq!(errors.len(), 3);
        let sections: Vec<_> = errors.sections().collect();
        assert_eq!(sections, vec![Section::Body, Section::Query]);

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "email", "age"]);
    }

    #[test]
    fn merge_keeps_every_error() {
        let mut a: SectionErrors = [ValidationError::required(Section::Path, "id")]
            .into_iter()
            .collect();
        let b: SectionErrors = [
            ValidationError::required(Section::Path, "slug"),
            ValidationError::required(Section::Header, "x-token"),
        ]
        .into_iter()
        .collect();
        a.merge(b);
        assert_eq!(a.section(Section::Path).len(), 2);
        assert_eq!(a.section(Section::Header).len(), 1);
        assert!(a.section(Section::Cookie).is_empty());
    }

    #[test]
    fn conversion_message_quotes_raw_value() {
        let error = ValidationError::conversion(Section::Query, "age", "abc");
        assert_eq!(error.code, "invalid_type");
        assert_eq!(error.message, r#"invalid query value "abc""#);
        assert_eq!(error.to_string(), r#"query.age: invalid query value "abc""#);
    }

    #[test]
    fn serializes_error_envelope() {
        let errors: SectionErrors = [ValidationError::required(Section::Body, "name")]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&errors).unwrap();

        assert_eq!(json["error"]["type"], "validation_error");
        assert_eq!(json["error"]["message"], "Request validation failed");
        assert_eq!(json["error"]["fields"][0]["section"], "body");
        assert_eq!(json["error"]["fields"][0]["field"], "name");
        assert_eq!(json["error"]["fields"][0]["code"], "required");
    }

    #[test]
    fn empty_collection_is_ok() {
        assert!(SectionErrors::new().into_result().is_ok());
        assert_eq!(
            SectionErrors::new().to_string(),
            "Request validation failed: 0 error(s)"
        );
    }
}
