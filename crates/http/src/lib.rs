//! Authenticated REST client for the POS admin API
//!
//! [`ClientFactory`] builds one [`ApiClient`] per API module. All of them
//! attach the stored bearer token to outgoing requests and, on `401`, share a
//! single token refresh before replaying the request once.

pub mod client;
pub mod notify;
pub mod services;

pub use client::{
    ApiClient, ApiModule, ClientError, ClientFactory, RefreshCoordinator, RefreshError,
};
pub use notify::{Notifier, Toast, ToastLevel, TracingNotifier};
