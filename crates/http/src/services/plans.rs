//! Subscription plan management

use crate::client::{ApiClient, ClientError};
use chrono::{DateTime, Utc};
use posadmin_core::LocalStorage;
use posadmin_core::types::{CreatePlanRequest, ListQuery, Paginated, Plan, UpdatePlanRequest};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Storage key for the cached plan list
pub const CACHE_KEY: &str = "cached_plans";

#[derive(Debug, Serialize, Deserialize)]
struct CachedPlans {
    query: String,
    fetched_at: DateTime<Utc>,
    page: Paginated<Plan>,
}

#[derive(Clone)]
pub struct PlanService {
    client: ApiClient,
    storage: Arc<dyn LocalStorage>,
    ttl: Duration,
}

impl PlanService {
    pub fn new(client: ApiClient, storage: Arc<dyn LocalStorage>, ttl: Duration) -> Self {
        Self {
            client,
            storage,
            ttl,
        }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Paginated<Plan>, ClientError> {
        let request = self.client.request(Method::GET, "").query(query);
        self.client.execute(request).await
    }

    /// Like [`list`](Self::list), served from local storage while the cached
    /// copy for the same query is younger than the TTL
    pub async fn list_cached(&self, query: &ListQuery) -> Result<Paginated<Plan>, ClientError> {
        let key = query.cache_key();
        if let Some(cached) = self.storage.get_json::<CachedPlans>(CACHE_KEY) {
            let fresh = Utc::now()
                .signed_duration_since(cached.fetched_at)
                .to_std()
                .is_ok_and(|age| age < self.ttl);
            if fresh && cached.query == key {
                debug!(query = %key, "Serving plans from cache");
                return Ok(cached.page);
            }
        }

        let page = self.list(query).await?;
        let cached = CachedPlans {
            query: key,
            fetched_at: Utc::now(),
            page,
        };
        if let Err(e) = self.storage.set_json(CACHE_KEY, &cached) {
            warn!(error = %e, "Could not cache plan list");
        }
        Ok(cached.page)
    }

    pub async fn get(&self, id: &str) -> Result<Plan, ClientError> {
        let request = self.client.request_to(Method::GET, &[id])?;
        self.client.execute(request).await
    }

    pub async fn create(&self, plan: &CreatePlanRequest) -> Result<Plan, ClientError> {
        let request = self.client.request(Method::POST, "").json(plan);
        let created = self.client.execute(request).await?;
        self.invalidate();
        Ok(created)
    }

    pub async fn update(&self, id: &str, changes: &UpdatePlanRequest) -> Result<Plan, ClientError> {
        let request = self
            .client
            .request_to(Method::PATCH, &[id])?
            .json(changes);
        let updated = self.client.execute(request).await?;
        self.invalidate();
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let request = self.client.request_to(Method::DELETE, &[id])?;
        self.client.execute_empty(request).await?;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&self) {
        if let Err(e) = self.storage.remove_item(CACHE_KEY) {
            warn!(error = %e, "Could not invalidate plan cache");
        }
    }
}
