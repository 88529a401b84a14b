//! Client error types

use posadmin_core::CoreError;
use posadmin_core::types::{ApiEnvelope, FieldError};
use reqwest::StatusCode;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error, no usable response received
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Credentials were rejected and could not be refreshed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API rejected the payload with field-level errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    /// Server returned an error status or an unsuccessful envelope
    #[error("Server error {status}: {message}")]
    Api { status: u16, message: String },

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Local storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] CoreError),
}

/// Coarse buckets used to pick a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authentication,
    Validation,
    Application,
}

impl ClientError {
    /// Build an error from a non-success response body.
    ///
    /// The body is parsed as an envelope when possible so that `error`,
    /// `message` and `validation_errors` surface; otherwise the raw text is used.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body) {
            Ok(envelope) => Self::from_envelope(status, &envelope),
            Err(_) => {
                let message = if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.trim().to_string()
                };
                Self::from_status(status, message)
            }
        }
    }

    /// Build an error from an envelope with `success: false`
    pub fn from_envelope<T>(status: StatusCode, envelope: &ApiEnvelope<T>) -> Self {
        let message = envelope.failure_message();
        if !envelope.validation_errors().is_empty() {
            return Self::Validation {
                message,
                errors: envelope.validation_errors().to_vec(),
            };
        }
        if status.is_success() {
            return Self::Api {
                status: status.as_u16(),
                message,
            };
        }
        Self::from_status(status, message)
    }

    /// Create error from HTTP status code
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            422 => Self::Validation {
                message,
                errors: Vec::new(),
            },
            _ => Self::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Request(e) if e.is_decode() => ErrorCategory::Application,
            Self::Request(_) => ErrorCategory::Network,
            Self::AuthenticationFailed(_) => ErrorCategory::Authentication,
            Self::Validation { .. } => ErrorCategory::Validation,
            _ => ErrorCategory::Application,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_validation_errors_win() {
        let body = r#"{
            "success": false,
            "message": "Validation failed",
            "validation_errors": [{ "field": "slug", "message": "already taken" }]
        }"#;
        let err = ClientError::from_response(StatusCode::BAD_REQUEST, body);
        match err {
            ClientError::Validation { message, errors } => {
                assert_eq!(message, "Validation failed");
                assert_eq!(errors[0].field, "slug");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_body() {
        let err = ClientError::from_response(StatusCode::NOT_FOUND, "no such plan\n");
        assert!(matches!(err, ClientError::NotFound(ref m) if m == "no such plan"));
        assert_eq!(err.category(), ErrorCategory::Application);
    }

    #[test]
    fn test_empty_body_uses_status_text() {
        let err = ClientError::from_response(StatusCode::UNAUTHORIZED, "");
        assert!(err.is_unauthorized());
        assert_eq!(err.category(), ErrorCategory::Authentication);
    }

    #[test]
    fn test_unsuccessful_envelope_on_200() {
        let envelope: ApiEnvelope<()> =
            serde_json::from_str(r#"{ "success": false, "error": "Plan is in use" }"#).unwrap();
        let err = ClientError::from_envelope(StatusCode::OK, &envelope);
        assert!(matches!(
            err,
            ClientError::Api { status: 200, ref message } if message == "Plan is in use"
        ));
    }
}
