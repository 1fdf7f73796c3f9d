//! String format hints (`email`, `uri`, `uuid`, ...).

use regex::Regex;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static URI_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static DATE_TIME_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static DATE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
    EMAIL_REGEX
        .get_or_init(|| {
            // RFC 5322 simplified email regex
            Regex::new(concat!(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@",
                r"[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?",
                r"(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
            ))
            .ok()
        })
        .as_ref()
}

fn uri_regex() -> Option<&'static Regex> {
    URI_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/$.?#][^\s]*$").ok())
        .as_ref()
}

fn date_time_regex() -> Option<&'static Regex> {
    DATE_TIME_REGEX
        .get_or_init(|| {
            Regex::new(
                r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:[Zz]|[+-]\d{2}:\d{2})$",
            )
            .ok()
        })
        .as_ref()
}

fn date_regex() -> Option<&'static Regex> {
    DATE_REGEX
        .get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok())
        .as_ref()
}

/// A string format hint.
///
/// Known formats are checked during validation and emitted as the schema
/// `format` keyword. `Other` formats are only documented.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    Email,
    Uri,
    Uuid,
    DateTime,
    Date,
    Ipv4,
    Ipv6,
    Other(String),
}

impl Format {
    /// Parse a format keyword. Unknown keywords become [`Format::Other`].
    pub fn parse(keyword: &str) -> Self {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "email" => Format::Email,
            "uri" | "url" => Format::Uri,
            "uuid" => Format::Uuid,
            "date-time" | "datetime" => Format::DateTime,
            "date" => Format::Date,
            "ipv4" => Format::Ipv4,
            "ipv6" => Format::Ipv6,
            other => Format::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Format::Email => "email",
            Format::Uri => "uri",
            Format::Uuid => "uuid",
            Format::DateTime => "date-time",
            Format::Date => "date",
            Format::Ipv4 => "ipv4",
            Format::Ipv6 => "ipv6",
            Format::Other(name) => name,
        }
    }

    /// Whether `value` satisfies the format.
    pub fn matches(&self, value: &str) -> bool {
        let by_regex = |re: Option<&Regex>| re.map(|re| re.is_match(value)).unwrap_or(true);
        match self {
            Format::Email => by_regex(email_regex()),
            Format::Uri => by_regex(uri_regex()),
            Format::Uuid => uuid::Uuid::parse_str(value).is_ok(),
            Format::DateTime => by_regex(date_time_regex()),
            Format::Date => by_regex(date_regex()),
            Format::Ipv4 => value.parse::<Ipv4Addr>().is_ok(),
            Format::Ipv6 => value.parse::<Ipv6Addr>().is_ok(),
            Format::Other(_) => true,
        }
    }

    /// Default message when a value does not match.
    pub(crate) fn mismatch_message(&self) -> String {
        match self {
            Format::Email => "Invalid email format".to_string(),
            Format::Uri => "Invalid URI format".to_string(),
            Format::Uuid => "Invalid UUID format".to_string(),
            other => format!("Value does not match format '{}'", other.as_str()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
