//! Declarative field constraints.
//!
//! A [`Constraints`] value is attached to every field descriptor. It is used
//! twice: by the decode pipeline, which runs [`Constraints::check`] against
//! converted values, and by the schema compiler, which translates each rule
//! into the matching JSON Schema keyword.

use crate::format::Format;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Error from a single constraint rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct RuleError {
    /// Machine-readable rule code (e.g. "range", "length", "pattern")
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl RuleError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A regex pattern compiled on first use.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    compiled: OnceLock<Option<Regex>>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled regex, or `None` when the source is not a valid pattern.
    pub fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(&self.source) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!(pattern = %self.source, error = %err, "invalid field pattern");
                    None
                }
            })
            .as_ref()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// The constraint set of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub required: bool,
    /// Inclusive numeric lower bound
    pub minimum: Option<f64>,
    /// Inclusive numeric upper bound
    pub maximum: Option<f64>,
    /// Minimum string length (characters) or item count
    pub min_length: Option<usize>,
    /// Maximum string length (characters) or item count
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    /// Enumerated literal values, compared textually
    pub one_of: Vec<String>,
    pub format: Option<Format>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a compact rule string such as `"required,min=0,max=120,format=email"`.
    ///
    /// Recognized keywords: `required`, `min`, `max`, `minLength`/`min_length`,
    /// `maxLength`/`max_length`, `len`, `pattern`, `enum`/`oneof` (values
    /// separated by `|`) and `format`. Unknown keywords and malformed values
    /// are ignored.
    pub fn parse(rules: &str) -> Self {
        let mut constraints = Self::new();
        for rule in rules.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let (key, value) = match rule.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (rule, None),
            };
            constraints.apply(key, value);
        }
        constraints
    }

    fn apply(&mut self, key: &str, value: Option<&str>) {
        let number = || value.and_then(|v| v.parse::<f64>().ok());
        let count = || value.and_then(|v| v.parse::<usize>().ok());
        match key {
            "required" => self.required = true,
            "min" | "minimum" if number().is_some() => self.minimum = number(),
            "max" | "maximum" if number().is_some() => self.maximum = number(),
            "minLength" | "min_length" if count().is_some() => self.min_length = count(),
            "maxLength" | "max_length" if count().is_some() => self.max_length = count(),
            "len" if count().is_some() => {
                self.min_length = count();
                self.max_length = count();
            }
            "pattern" => {
                if let Some(v) = value {
                    self.pattern = Some(Pattern::new(v));
                }
            }
            "enum" | "oneof" | "one_of" => {
                if let Some(v) = value {
                    self.one_of = v.split('|').map(|s| s.trim().to_string()).collect();
                }
            }
            "format" => self.format = value.map(Format::parse),
            _ => tracing::debug!(rule = key, "ignoring unrecognized constraint"),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(Pattern::new(pattern));
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Fold `other` into `self`; rules set in `other` win.
    pub fn merge(mut self, other: Constraints) -> Self {
        self.required |= other.required;
        self.minimum = other.minimum.or(self.minimum);
        self.maximum = other.maximum.or(self.maximum);
        self.min_length = other.min_length.or(self.min_length);
        self.max_length = other.max_length.or(self.max_length);
        self.pattern = other.pattern.or(self.pattern);
        if !other.one_of.is_empty() {
            self.one_of = other.one_of;
        }
        self.format = other.format.or(self.format);
        self
    }

    /// Check a converted value against every rule.
    ///
    /// Presence is not checked here: callers report missing required fields
    /// themselves, and `null` passes every rule.
    pub fn check(&self, value: &Value) -> Vec<RuleError> {
        let mut errors = Vec::new();
        match value {
            Value::Null => return errors,
            Value::Number(n) => {
                if let Some(n) = n.as_f64() {
                    self.check_range(n, &mut errors);
                }
            }
            Value::String(s) => {
                self.check_length(s.chars().count(), "characters", &mut errors);
                self.check_pattern(s, &mut errors);
                self.check_format(s, &mut errors);
            }
            Value::Array(items) => {
                self.check_length(items.len(), "items", &mut errors);
            }
            Value::Bool(_) | Value::Object(_) => {}
        }
        self.check_one_of(value, &mut errors);
        errors
    }

    fn check_range(&self, n: f64, errors: &mut Vec<RuleError>) {
        if let Some(min) = self.minimum {
            if n < min {
                errors.push(RuleError::new(
                    "range",
                    format!("Value must be at least {}", display_bound(min)),
                ));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                errors.push(RuleError::new(
                    "range",
                    format!("Value must be at most {}", display_bound(max)),
                ));
            }
        }
    }

    fn check_length(&self, len: usize, unit: &str, errors: &mut Vec<RuleError>) {
        if let Some(min) = self.min_length {
            if len < min {
                errors.push(RuleError::new(
                    "length",
                    format!("Length must be at least {min} {unit}"),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                errors.push(RuleError::new(
                    "length",
                    format!("Length must be at most {max} {unit}"),
                ));
            }
        }
    }

    fn check_pattern(&self, s: &str, errors: &mut Vec<RuleError>) {
        let Some(pattern) = &self.pattern else {
            return;
        };
        match pattern.regex() {
            Some(re) if re.is_match(s) => {}
            Some(_) => errors.push(RuleError::new(
                "pattern",
                format!("Value does not match pattern {}", pattern.as_str()),
            )),
            None => errors.push(RuleError::new(
                "pattern",
                format!("Invalid regex pattern: {}", pattern.as_str()),
            )),
        }
    }

    fn check_format(&self, s: &str, errors: &mut Vec<RuleError>) {
        if let Some(format) = &self.format {
            if !format.matches(s) {
                errors.push(RuleError::new("format", format.mismatch_message()));
            }
        }
    }

    fn check_one_of(&self, value: &Value, errors: &mut Vec<RuleError>) {
        if self.one_of.is_empty() {
            return;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return,
        };
        if !self.one_of.iter().any(|allowed| *allowed == text) {
            errors.push(RuleError::new(
                "enum",
                format!("Value must be one of: {}", self.one_of.join(", ")),
            ));
        }
    }
}

/// Render a bound without a trailing `.0` for whole numbers.
fn display_bound(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parse_recognized_rules() {
        let c = Constraints::parse("required, min=0, max=120, minLength=2, format=email");
        assert!(c.required);
        assert_eq!(c.minimum, Some(0.0));
        assert_eq!(c.maximum, Some(120.0));
        assert_eq!(c.min_length, Some(2));
        assert_eq!(c.format, Some(Format::Email));
    }

    #[test]
    fn parse_ignores_unknown_and_malformed_rules() {
        let c = Constraints::parse("required,frobnicate=3,min=abc,unique");
        assert!(c.required);
        assert_eq!(c.minimum, None);
        assert!(c.one_of.is_empty());
        assert_eq!(c.format, None);
    }

    #[test]
    fn parse_enum_values() {
        let c = Constraints::parse("enum=red|green|blue");
        assert_eq!(c.one_of, vec!["red", "green", "blue"]);
    }

    #[test]
    fn range_violations() {
        let c = Constraints::new().min(0.0).max(10.0);
        assert!(c.check(&json!(5)).is_empty());
        let errors = c.check(&json!(-1));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "range");
        assert_eq!(errors[0].message, "Value must be at least 0");
        assert_eq!(c.check(&json!(10.5))[0].message, "Value must be at most 10");
    }

    #[test]
    fn length_counts_characters_and_items() {
        let c = Constraints::new().min_length(2).max_length(3);
        assert!(c.check(&json!("héé")).is_empty());
        assert_eq!(c.check(&json!("a"))[0].code, "length");
        assert_eq!(c.check(&json!([1, 2, 3, 4]))[0].code, "length");
    }

    #[test]
    fn pattern_and_invalid_pattern() {
        let c = Constraints::new().pattern("^[a-z]+$");
        assert!(c.check(&json!("abc")).is_empty());
        assert_eq!(c.check(&json!("ABC"))[0].code, "pattern");

        let broken = Constraints::new().pattern("(unclosed");
        let errors = broken.check(&json!("x"));
        assert_eq!(errors[0].code, "pattern");
        assert!(errors[0].message.contains("Invalid regex"));
    }

    #[test]
    fn enum_compares_textually() {
        let c = Constraints::new().one_of(["1", "2", "true"]);
        assert!(c.check(&json!(2)).is_empty());
        assert!(c.check(&json!(true)).is_empty());
        assert_eq!(c.check(&json!("3"))[0].code, "enum");
    }

    #[test]
    fn null_passes_every_rule() {
        let c = Constraints::parse("required,min=1,minLength=3,format=email");
        assert!(c.check(&Value::Null).is_empty());
    }

    #[test]
    fn merge_prefers_other() {
        let merged = Constraints::new()
            .min(1.0)
            .max(5.0)
            .merge(Constraints::new().required().max(9.0));
        assert!(merged.required);
        assert_eq!(merged.minimum, Some(1.0));
        assert_eq!(merged.maximum, Some(9.0));
    }

    proptest! {
        #[test]
        fn prop_range_matches_comparison(n in -1000i64..1000, min in -500i64..500) {
            let c = Constraints::new().min(min as f64);
            let errors = c.check(&json!(n));
            prop_assert_eq!(errors.is_empty(), n >= min);
        }
    }
}
