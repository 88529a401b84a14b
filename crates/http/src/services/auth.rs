//! Login, logout and session inspection

use crate::client::{ApiClient, ClientError};
use posadmin_core::types::{LoginRequest, LoginResponse, User};
use posadmin_core::{CredentialStore, PermissionSet};
use reqwest::Method;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    credentials: CredentialStore,
}

impl AuthService {
    pub fn new(client: ApiClient, credentials: CredentialStore) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Exchange email and password for a session and store it
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let request = self.client.request(Method::POST, "/login").json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        let response: LoginResponse = self.client.execute(request).await?;

        self.credentials.set_session(
            &response.access_token,
            response.refresh_token.as_deref(),
            Some(email),
        )?;
        info!(email, "Logged in");
        Ok(response)
    }

    /// End the session. The server call is best-effort; local credentials
    /// are always cleared.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.credentials.access_token().is_some() {
            let request = self.client.request(Method::POST, "/logout");
            if let Err(e) = self.client.execute_empty(request).await {
                warn!(error = %e, "Logout call failed, clearing local session anyway");
            }
        }
        self.credentials.clear()?;
        Ok(())
    }

    /// The logged-in user
    pub async fn me(&self) -> Result<User, ClientError> {
        let request = self.client.request(Method::GET, "/me");
        self.client.execute(request).await
    }

    /// Effective permissions of the logged-in user
    pub async fn permissions(&self) -> Result<PermissionSet, ClientError> {
        let user = self.me().await?;
        Ok(PermissionSet::from_names(&user.permissions))
    }

    pub fn is_logged_in(&self) -> bool {
        self.credentials.is_logged_in()
    }

    pub fn user_email(&self) -> Option<String> {
        self.credentials.user_email()
    }
}
