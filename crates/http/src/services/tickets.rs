//! Support tickets

use crate::client::{ApiClient, ClientError};
use posadmin_core::types::{
    CreateTicketRequest, ListQuery, Paginated, Ticket, TicketReply, TicketStatus,
};
use reqwest::Method;
use serde_json::json;

#[derive(Clone)]
pub struct TicketService {
    client: ApiClient,
}

impl TicketService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Ticket>, ClientError> {
        let request = self.client.request(Method::GET, "").query(query);
        self.client.execute(request).await
    }

    pub async fn get(&self, id: &str) -> Result<Ticket, ClientError> {
        let request = self.client.request_to(Method::GET, &[id])?;
        self.client.execute(request).await
    }

    pub async fn create(&self, ticket: &CreateTicketRequest) -> Result<Ticket, ClientError> {
        let request = self.client.request(Method::POST, "").json(ticket);
        self.client.execute(request).await
    }

    pub async fn reply(&self, id: &str, body: &str) -> Result<TicketReply, ClientError> {
        if body.trim().is_empty() {
            return Err(ClientError::Validation {
                message: "reply body is empty".into(),
                errors: Vec::new(),
            });
        }
        let request = self
            .client
            .request_to(Method::POST, &[id, "replies"])?
            .json(&json!({ "body": body }));
        self.client.execute(request).await
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: TicketStatus,
    ) -> Result<Ticket, ClientError> {
        let request = self
            .client
            .request_to(Method::PATCH, &[id, "status"])?
            .json(&json!({ "status": status }));
        self.client.execute(request).await
    }
}
