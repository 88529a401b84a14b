//! User-facing notifications for failed operations

use crate::client::{ClientError, ErrorCategory};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short message shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            title: "Done".into(),
            message: message.into(),
        }
    }

    /// Pick title and wording from the error's category
    pub fn from_error(err: &ClientError) -> Self {
        match (err.category(), err) {
            (ErrorCategory::Network, _) => Self {
                level: ToastLevel::Error,
                title: "Connection problem".into(),
                message: "Could not reach the server. Check your connection and try again."
                    .into(),
            },
            (ErrorCategory::Authentication, _) => Self {
                level: ToastLevel::Warning,
                title: "Session expired".into(),
                message: "Please log in again.".into(),
            },
            (ErrorCategory::Validation, ClientError::Validation { message, errors }) => {
                let message = if errors.is_empty() {
                    message.clone()
                } else {
                    errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                Self {
                    level: ToastLevel::Warning,
                    title: "Please check your input".into(),
                    message,
                }
            }
            _ => Self {
                level: ToastLevel::Error,
                title: "Something went wrong".into(),
                message: application_message(err),
            },
        }
    }
}

fn application_message(err: &ClientError) -> String {
    match err {
        ClientError::Api { message, .. }
        | ClientError::BadRequest(message)
        | ClientError::Forbidden(message)
        | ClientError::NotFound(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Delivers toasts to wherever the operator is looking
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: &Toast);

    fn notify_error(&self, err: &ClientError) {
        self.notify(&Toast::from_error(err));
    }
}

/// Writes toasts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: &Toast) {
        match toast.level {
            ToastLevel::Info | ToastLevel::Success => {
                info!(title = %toast.title, "{}", toast.message);
            }
            ToastLevel::Warning => warn!(title = %toast.title, "{}", toast.message),
            ToastLevel::Error => error!(title = %toast.title, "{}", toast.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posadmin_core::types::FieldError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Toast>>);

    impl Notifier for Recorder {
        fn notify(&self, toast: &Toast) {
            self.0.lock().unwrap().push(toast.clone());
        }
    }

    #[test]
    fn test_validation_toast_lists_fields() {
        let err = ClientError::Validation {
            message: "Validation failed".into(),
            errors: vec![
                FieldError {
                    field: "name".into(),
                    message: "is required".into(),
                },
                FieldError {
                    field: "price".into(),
                    message: "must be positive".into(),
                },
            ],
        };
        let toast = Toast::from_error(&err);
        assert_eq!(toast.level, ToastLevel::Warning);
        assert_eq!(toast.message, "name: is required\nprice: must be positive");
    }

    #[test]
    fn test_auth_toast() {
        let toast = Toast::from_error(&ClientError::AuthenticationFailed("expired".into()));
        assert_eq!(toast.title, "Session expired");
    }

    #[test]
    fn test_application_toast_uses_server_message() {
        let recorder = Recorder::default();
        recorder.notify_error(&ClientError::Api {
            status: 409,
            message: "Plan is assigned to 3 tenants".into(),
        });

        let toasts = recorder.0.lock().unwrap();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, ToastLevel::Error);
        assert_eq!(toasts[0].message, "Plan is assigned to 3 tenants");
    }
}
