//! Router configuration with environment variable support.
//!
//! ```rust
//! use typeroute_core::{Environment, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .environment(Environment::Production)
//!     .max_body_size(64 * 1024);
//! assert_eq!(config.max_body_size, 65536);
//! assert!(!config.environment.show_error_details());
//! ```

use http::StatusCode;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Default body limit: 2 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable deserialization failed.
    #[error("Configuration error: {0}")]
    Envy(#[from] envy::Error),
    /// A value was read but is not acceptable.
    #[error("Invalid configuration value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Environment profile of the router.
///
/// Detected from the `TYPEROUTE_ENV` environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Verbose errors: internal details are included in error bodies.
    Development,
    /// Internal error details are masked.
    Production,
    /// Custom environment name, treated like development.
    Custom(String),
}

impl Environment {
    /// Detect the current environment from `TYPEROUTE_ENV`.
    ///
    /// Returns `Production` for "production"/"prod", `Development` for
    /// "development"/"dev" or when unset, and `Custom(name)` otherwise.
    pub fn current() -> Self {
        match std::env::var("TYPEROUTE_ENV") {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::Development,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "production" | "prod" => Self::Production,
            "development" | "dev" | "" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Check if internal error details should be shown.
    pub fn show_error_details(&self) -> bool {
        !self.is_production()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// Settings shared by every route of a router.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// `TYPEROUTE_ENV`
    #[serde(rename = "env")]
    pub environment: Environment,
    /// Largest accepted request body in bytes (`TYPEROUTE_MAX_BODY_SIZE`)
    pub max_body_size: usize,
    /// Status used for aggregated validation failures (`TYPEROUTE_VALIDATION_STATUS`)
    #[serde(deserialize_with = "status_code")]
    pub validation_status: StatusCode,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            environment: Environment::current(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            validation_status: StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `TYPEROUTE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load from explicit `(name, value)` pairs using the `TYPEROUTE_` prefix.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::prefixed("TYPEROUTE_").from_iter(vars)?;
        if !config.validation_status.is_client_error() {
            return Err(ConfigError::InvalidValue {
                name: "TYPEROUTE_VALIDATION_STATUS",
                value: config.validation_status.as_u16().to_string(),
            });
        }
        Ok(config)
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn validation_status(mut self, status: StatusCode) -> Self {
        self.validation_status = status;
        self
    }
}

fn status_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}
