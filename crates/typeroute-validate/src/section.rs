//! Request sections a field can be sourced from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Origin of a request field.
///
/// `Body` fields are read from the structured (JSON) payload; every other
/// section is looked up key by key through a parameter source.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Body,
    Path,
    Query,
    Header,
    Cookie,
}

impl Section {
    /// Every section, in reporting order.
    pub const ALL: [Section; 5] = [
        Section::Body,
        Section::Path,
        Section::Query,
        Section::Header,
        Section::Cookie,
    ];

    /// Lowercase name, as used in error payloads and OpenAPI `in`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Body => "body",
            Section::Path => "path",
            Section::Query => "query",
            Section::Header => "header",
            Section::Cookie => "cookie",
        }
    }

    pub fn is_body(&self) -> bool {
        matches!(self, Section::Body)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown section name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request section `{0}`")]
pub struct UnknownSection(pub String);

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "body" | "json" => Ok(Section::Body),
            "path" => Ok(Section::Path),
            "query" => Ok(Section::Query),
            "header" => Ok(Section::Header),
            "cookie" => Ok(Section::Cookie),
            _ => Err(UnknownSection(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_order_body_first() {
        let mut shuffled = vec![Section::Cookie, Section::Query, Section::Body, Section::Path];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Section::Body, Section::Path, Section::Query, Section::Cookie]
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Query".parse::<Section>(), Ok(Section::Query));
        assert_eq!("HEADER".parse::<Section>(), Ok(Section::Header));
        assert!("form".parse::<Section>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Section::Cookie).unwrap(), r#""cookie""#);
    }
}
