//! Error types for typeroute

use crate::config::Environment;
use crate::path::PathValidationError;
use http::{Method, StatusCode};
use serde::Serialize;
use std::fmt;
use typeroute_validate::{SectionErrors, ValidationError};
use uuid::Uuid;

/// Result type alias for handler results
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Standard API error type
///
/// Handlers return it (or anything convertible into it); the pipeline maps
/// it to a response with a consistent JSON format.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code
    pub status: StatusCode,
    /// Error type identifier
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level validation errors
    pub fields: Option<Vec<ValidationError>>,
    /// Internal details (hidden in production)
    pub(crate) internal: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(
        status: StatusCode,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type: error_type.into(),
            message: message.into(),
            fields: None,
            internal: None,
        }
    }

    /// Create a validation error listing every field error
    pub fn validation(errors: SectionErrors) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error_type: "validation_error".to_string(),
            message: "Request validation failed".to_string(),
            fields: Some(errors.into_vec()),
            internal: None,
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// Create a 401 Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// Create a 403 Forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// Create a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Create a 409 Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// Create a 413 Payload Too Large error
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
    }

    /// Create a 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Create a 503 Service Unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }

    /// Add internal details (for logging, hidden from response in prod)
    pub fn with_internal(mut self, details: impl Into<String>) -> Self {
        self.internal = Some(details.into());
        self
    }

    pub fn internal_details(&self) -> Option<&str> {
        self.internal.as_deref()
    }

    /// Build the JSON envelope for this error.
    pub fn to_body(&self, environment: &Environment, request_id: Option<Uuid>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                error_type: self.error_type.clone(),
                message: self.message.clone(),
                fields: self.fields.clone(),
                details: if environment.show_error_details() {
                    self.internal.clone()
                } else {
                    None
                },
            },
            request_id: request_id.map(|id| id.to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for ApiError {}

/// JSON representation of API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<ValidationError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<SectionErrors> for ApiError {
    fn from(errors: SectionErrors) -> Self {
        ApiError::validation(errors)
    }
}

// Conversion from common error types
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::bad_request(format!("Invalid JSON: {}", err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::internal("I/O error").with_internal(err.to_string())
    }
}

impl From<std::convert::Infallible> for ApiError {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

/// Route registration failures. Fatal at start-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid route path: {0}")]
    InvalidPath(#[from] PathValidationError),
    #[error("duplicate route {method} {path} (conflicts with {existing})")]
    DuplicateRoute {
        method: Method,
        path: String,
        existing: String,
    },
}

/// Terminal failures of one pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(SectionErrors),
    #[error("handler error: {0}")]
    Handler(ApiError),
    #[error("fault: {0}")]
    Fault(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("request body of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl PipelineError {
    /// Map the failure to the error returned to the client.
    pub fn into_api_error(self, validation_status: StatusCode) -> ApiError {
        match self {
            PipelineError::Validation(errors) => {
                let mut err = ApiError::validation(errors);
                err.status = validation_status;
                err
            }
            PipelineError::Handler(err) => err,
            PipelineError::Fault(detail) => {
                ApiError::internal("Internal server error").with_internal(detail)
            }
            PipelineError::Cancelled => ApiError::new(
                StatusCode::from_u16(499).unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                "cancelled",
                "Request cancelled",
            ),
            PipelineError::PayloadTooLarge { size, limit } => ApiError::payload_too_large(format!(
                "Request body of {size} bytes exceeds the {limit} byte limit"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeroute_validate::Section;

    #[test]
    fn validation_error_envelope() {
        let errors: SectionErrors = [ValidationError::required(Section::Body, "name")]
            .into_iter()
            .collect();
        let err = ApiError::from(errors);
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let body = serde_json::to_value(err.to_body(&Environment::Production, None)).unwrap();
        assert_eq!(body["error"]["type"], "validation_error");
        assert_eq!(body["error"]["fields"][0]["section"], "body");
        assert!(body.get("request_id").is_none());
    }

    #[test]
    fn internal_details_only_in_development() {
        let err = ApiError::internal("boom").with_internal("db down");
        let id = Uuid::nil();

        let dev = serde_json::to_value(err.to_body(&Environment::Development, Some(id))).unwrap();
        assert_eq!(dev["error"]["details"], "db down");
        assert_eq!(dev["request_id"], id.to_string());

        let prod = serde_json::to_value(err.to_body(&Environment::Production, Some(id))).unwrap();
        assert!(prod["error"].get("details").is_none());
        assert_eq!(prod["error"]["message"], "boom");
    }

    #[test]
    fn pipeline_errors_map_to_statuses() {
        let fault = PipelineError::Fault("panicked at 'x'".into())
            .into_api_error(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(fault.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fault.message, "Internal server error");
        assert_eq!(fault.internal_details(), Some("panicked at 'x'"));

        let cancelled = PipelineError::Cancelled.into_api_error(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(cancelled.status.as_u16(), 499);

        let validation = PipelineError::Validation(SectionErrors::new())
            .into_api_error(StatusCode::BAD_REQUEST);
        assert_eq!(validation.status, StatusCode::BAD_REQUEST);

        let too_large = PipelineError::PayloadTooLarge { size: 10, limit: 5 }
            .into_api_error(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(too_large.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn handler_errors_pass_through() {
        let err = PipelineError::Handler(ApiError::not_found("no such user"))
            .into_api_error(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "no such user");
    }
}
