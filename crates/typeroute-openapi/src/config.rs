//! OpenAPI configuration

use http::StatusCode;

/// Configuration for the generated document
#[derive(Debug, Clone)]
pub struct OpenApiConfig {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    pub description: Option<String>,
    /// Status documented for validation failures
    pub validation_status: StatusCode,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            title: "typeroute API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            validation_status: StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl OpenApiConfig {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Set API description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Document validation failures under another status
    pub fn validation_status(mut self, status: StatusCode) -> Self {
        self.validation_status = status;
        self
    }
}
