//! User accounts

use crate::client::{ApiClient, ClientError};
use posadmin_core::types::{CreateUserRequest, ListQuery, Paginated, UpdateUserRequest, User};
use reqwest::Method;
use serde_json::json;

#[derive(Clone)]
pub struct UserService {
    client: ApiClient,
}

impl UserService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<User>, ClientError> {
        let request = self.client.request(Method::GET, "").query(query);
        self.client.execute(request).await
    }

    pub async fn get(&self, id: &str) -> Result<User, ClientError> {
        let request = self.client.request_to(Method::GET, &[id])?;
        self.client.execute(request).await
    }

    pub async fn create(&self, user: &CreateUserRequest) -> Result<User, ClientError> {
        let request = self.client.request(Method::POST, "").json(user);
        self.client.execute(request).await
    }

    pub async fn update(&self, id: &str, changes: &UpdateUserRequest) -> Result<User, ClientError> {
        let request = self
            .client
            .request_to(Method::PATCH, &[id])?
            .json(changes);
        self.client.execute(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let request = self.client.request_to(Method::DELETE, &[id])?;
        self.client.execute_empty(request).await
    }

    pub async fn assign_role(&self, id: &str, role_id: &str) -> Result<User, ClientError> {
        let request = self
            .client
            .request_to(Method::PUT, &[id, "role"])?
            .json(&json!({ "role_id": role_id }));
        self.client.execute(request).await
    }
}
