//! Roles and the permission catalogue

use crate::client::{ApiClient, ClientError};
use posadmin_core::types::{Permission, Role, RoleRequest};
use reqwest::Method;
use serde_json::json;

#[derive(Clone)]
pub struct RoleService {
    roles: ApiClient,
    permissions: ApiClient,
}

impl RoleService {
    pub fn new(roles: ApiClient, permissions: ApiClient) -> Self {
        Self { roles, permissions }
    }

    pub async fn list(&self) -> Result<Vec<Role>, ClientError> {
        let request = self.roles.request(Method::GET, "");
        self.roles.execute(request).await
    }

    pub async fn get(&self, id: &str) -> Result<Role, ClientError> {
        let request = self.roles.request_to(Method::GET, &[id])?;
        self.roles.execute(request).await
    }

    pub async fn create(&self, role: &RoleRequest) -> Result<Role, ClientError> {
        if role.name.as_deref().is_none_or(str::is_empty) {
            return Err(ClientError::Validation {
                message: "role name is required".into(),
                errors: Vec::new(),
            });
        }
        let request = self.roles.request(Method::POST, "").json(role);
        self.roles.execute(request).await
    }

    pub async fn update(&self, id: &str, role: &RoleRequest) -> Result<Role, ClientError> {
        let request = self.roles.request_to(Method::PATCH, &[id])?.json(role);
        self.roles.execute(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let request = self.roles.request_to(Method::DELETE, &[id])?;
        self.roles.execute_empty(request).await
    }

    /// Every permission that can be granted
    pub async fn permissions(&self) -> Result<Vec<Permission>, ClientError> {
        let request = self.permissions.request(Method::GET, "");
        self.permissions.execute(request).await
    }

    /// Replace the permissions granted by a role
    pub async fn assign_permissions(
        &self,
        id: &str,
        permissions: &[String],
    ) -> Result<Role, ClientError> {
        let request = self
            .roles
            .request_to(Method::PUT, &[id, "permissions"])?
            .json(&json!({ "permissions": permissions }));
        self.roles.execute(request).await
    }
}
