//! Core types, storage and configuration for the POS admin client

pub mod access;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod storage;
pub mod types;

pub use access::{Action, PermissionDenied, PermissionSet};
pub use config::ClientConfig;
pub use credentials::{CredentialStore, Credentials};
pub use error::{CoreError, CoreResult};
pub use events::{AuthEvent, AuthEvents};
pub use storage::{FileStorage, LocalStorage, MemoryStorage};
