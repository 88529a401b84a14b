//! Tenant lifecycle

use crate::client::{ApiClient, ClientError};
use posadmin_core::types::{
    CreateTenantRequest, ListQuery, Paginated, Tenant, TenantStatus, UpdateTenantRequest,
};
use reqwest::Method;
use serde_json::json;

#[derive(Clone)]
pub struct TenantService {
    client: ApiClient,
}

impl TenantService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Tenant>, ClientError> {
        let request = self.client.request(Method::GET, "").query(query);
        self.client.execute(request).await
    }

    pub async fn get(&self, id: &str) -> Result<Tenant, ClientError> {
        let request = self.client.request_to(Method::GET, &[id])?;
        self.client.execute(request).await
    }

    pub async fn create(&self, tenant: &CreateTenantRequest) -> Result<Tenant, ClientError> {
        let request = self.client.request(Method::POST, "").json(tenant);
        self.client.execute(request).await
    }

    pub async fn update(
        &self,
        id: &str,
        changes: &UpdateTenantRequest,
    ) -> Result<Tenant, ClientError> {
        let request = self
            .client
            .request_to(Method::PATCH, &[id])?
            .json(changes);
        self.client.execute(request).await
    }

    pub async fn set_status(&self, id: &str, status: TenantStatus) -> Result<Tenant, ClientError> {
        let request = self
            .client
            .request_to(Method::PATCH, &[id, "status"])?
            .json(&json!({ "status": status }));
        self.client.execute(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let request = self.client.request_to(Method::DELETE, &[id])?;
        self.client.execute_empty(request).await
    }
}
