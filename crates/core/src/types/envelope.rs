//! Response envelope shared by every endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{ success, message, data?, error?, validation_errors?, timestamp }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub validation_errors: Option<Vec<FieldError>>,
    #[serde(default, deserialize_with = "super::timestamp::lenient")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl<T> ApiEnvelope<T> {
    pub fn validation_errors(&self) -> &[FieldError] {
        self.validation_errors.as_deref().unwrap_or_default()
    }

    /// Best human-readable description of a failure
    pub fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Request failed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success_envelope() {
        let envelope: ApiEnvelope<Vec<u32>> = serde_json::from_value(json!({
            "success": true,
            "message": "ok",
            "data": [1, 2],
            "timestamp": "2026-01-05T10:00:00Z"
        }))
        .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data, Some(vec![1, 2]));
        assert!(envelope.validation_errors().is_empty());
        assert!(envelope.timestamp.is_some());
    }

    #[test]
    fn test_zoneless_timestamp_does_not_break_decoding() {
        let envelope: ApiEnvelope<Vec<u32>> = serde_json::from_str(
            r#"{"success":true,"data":[1],"timestamp":"2024-05-01T10:00:00.123456"}"#,
        )
        .unwrap();
        assert_eq!(envelope.data, Some(vec![1]));
        assert!(envelope.timestamp.is_some());

        let envelope: ApiEnvelope<Vec<u32>> =
            serde_json::from_str(r#"{"success":true,"data":[2],"timestamp":"not a time"}"#)
                .unwrap();
        assert_eq!(envelope.data, Some(vec![2]));
        assert!(envelope.timestamp.is_none());
    }

    #[test]
    fn test_parse_validation_failure() {
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_value(json!({
            "success": false,
            "message": "Validation failed",
            "validation_errors": [
                { "field": "name", "message": "is required" },
                { "field": "price", "message": "must be positive" }
            ]
        }))
        .unwrap();

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.validation_errors().len(), 2);
        assert_eq!(envelope.validation_errors()[0].to_string(), "name: is required");
        assert_eq!(envelope.failure_message(), "Validation failed");
    }

    #[test]
    fn test_error_field_preferred_over_message() {
        let envelope: ApiEnvelope<()> = serde_json::from_value(json!({
            "success": false,
            "message": "Something went wrong",
            "error": "Tenant slug already taken",
            "validation_errors": null
        }))
        .unwrap();

        assert_eq!(envelope.failure_message(), "Tenant slug already taken");
    }
}
