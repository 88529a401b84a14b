//! Stored session credentials
//!
//! Tokens live in [`LocalStorage`] under fixed keys so that every client
//! built from the same storage sees the same session. Every write emits an
//! [`AuthEvent::StateChanged`].

use crate::error::CoreResult;
use crate::events::{AuthEvent, AuthEvents};
use crate::storage::LocalStorage;
use std::sync::Arc;
use tracing::info;

/// Storage keys used for the session
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const IS_LOGGED_IN: &str = "is_logged_in";
    pub const USER_EMAIL: &str = "user_email";
}

/// Point-in-time view of the stored session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub logged_in: bool,
    pub user_email: Option<String>,
}

/// Typed access to the session keys in local storage
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn LocalStorage>,
    events: AuthEvents,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn LocalStorage>, events: AuthEvents) -> Self {
        Self { storage, events }
    }

    pub fn storage(&self) -> &Arc<dyn LocalStorage> {
        &self.storage
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).filter(|v| !v.is_empty())
    }

    pub fn access_token(&self) -> Option<String> {
        self.non_empty(keys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.non_empty(keys::REFRESH_TOKEN)
    }

    pub fn user_email(&self) -> Option<String> {
        self.non_empty(keys::USER_EMAIL)
    }

    /// The logged-in flag, forced false when no access token is stored
    pub fn is_logged_in(&self) -> bool {
        self.access_token().is_some()
            && self.storage.get_item(keys::IS_LOGGED_IN).as_deref() == Some("true")
    }

    pub fn snapshot(&self) -> Credentials {
        Credentials {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            logged_in: self.is_logged_in(),
            user_email: self.user_email(),
        }
    }

    /// Store a fresh session after login
    pub fn set_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user_email: Option<&str>,
    ) -> CoreResult<()> {
        if access_token.is_empty() {
            return self.clear();
        }
        self.write_tokens(access_token, refresh_token)?;
        match user_email {
            Some(email) => self.storage.set_item(keys::USER_EMAIL, email)?,
            None => self.storage.remove_item(keys::USER_EMAIL)?,
        }
        info!(user = user_email.unwrap_or("<unknown>"), "Session stored");
        self.events.emit(AuthEvent::StateChanged { logged_in: true });
        Ok(())
    }

    /// Replace tokens after a successful refresh, keeping the user email.
    /// A `None` refresh token keeps the existing one.
    pub fn update_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> CoreResult<()> {
        if access_token.is_empty() {
            return self.clear();
        }
        self.write_tokens(access_token, refresh_token)?;
        self.events.emit(AuthEvent::StateChanged { logged_in: true });
        Ok(())
    }

    fn write_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> CoreResult<()> {
        self.storage.set_item(keys::ACCESS_TOKEN, access_token)?;
        if let Some(refresh) = refresh_token {
            self.storage.set_item(keys::REFRESH_TOKEN, refresh)?;
        }
        self.storage.set_item(keys::IS_LOGGED_IN, "true")
    }

    /// Remove every session key
    pub fn clear(&self) -> CoreResult<()> {
        // Flag first so a partial failure never leaves it set without a token
        self.storage.remove_item(keys::IS_LOGGED_IN)?;
        self.storage.remove_item(keys::ACCESS_TOKEN)?;
        self.storage.remove_item(keys::REFRESH_TOKEN)?;
        self.storage.remove_item(keys::USER_EMAIL)?;
        info!("Session cleared");
        self.events.emit(AuthEvent::StateChanged { logged_in: false });
        Ok(())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStorage::new()), AuthEvents::new())
    }

    #[test]
    fn test_set_session_and_clear() {
        let store = store();
        let mut rx = store.events().subscribe();

        store
            .set_session("access-1", Some("refresh-1"), Some("admin@example.com"))
            .unwrap();
        assert_eq!(
            store.snapshot(),
            Credentials {
                access_token: Some("access-1".into()),
                refresh_token: Some("refresh-1".into()),
                logged_in: true,
                user_email: Some("admin@example.com".into()),
            }
        );

        store.clear().unwrap();
        assert_eq!(store.snapshot(), Credentials::default());

        assert_eq!(
            rx.try_recv().unwrap(),
            AuthEvent::StateChanged { logged_in: true }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            AuthEvent::StateChanged { logged_in: false }
        );
    }

    #[test]
    fn test_update_tokens_keeps_refresh_when_absent() {
        let store = store();
        store.set_session("a1", Some("r1"), None).unwrap();
        store.update_tokens("a2", None).unwrap();

        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    }

    #[test]
    fn test_flag_without_token_is_not_logged_in() {
        let store = store();
        store.storage().set_item(keys::IS_LOGGED_IN, "true").unwrap();
        assert!(!store.is_logged_in());

        store.storage().set_item(keys::ACCESS_TOKEN, "").unwrap();
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_empty_access_token_clears_session() {
        let store = store();
        store.set_session("a1", Some("r1"), None).unwrap();
        store.update_tokens("", Some("r2")).unwrap();

        assert_eq!(store.snapshot(), Credentials::default());
    }
}
