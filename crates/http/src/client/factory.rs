//! Per-module client construction
//!
//! Every client built by one [`ClientFactory`] shares the same HTTP connection
//! pool, credential store and [`RefreshCoordinator`].

use super::error::ClientError;
use super::interceptor::BearerAuth;
use super::refresh::{
    DEFAULT_ENTRY_TIMEOUT, DEFAULT_MAX_QUEUE, HttpTokenRefresher, RefreshCoordinator,
    RefreshOnUnauthorized, TokenRefresher,
};
use super::ApiClient;
use crate::services::{
    AuthService, PlanService, RoleService, TenantService, TicketService, UserService,
};
use posadmin_core::{ClientConfig, CredentialStore};
use reqwest::{ClientBuilder, header};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PLANS_TTL: Duration = Duration::from_secs(300);

/// API areas, each served under its own path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiModule {
    Auth,
    Plans,
    Roles,
    Permissions,
    Tenants,
    Users,
    Tickets,
}

impl ApiModule {
    pub fn path(self) -> &'static str {
        match self {
            Self::Auth => "/auth",
            Self::Plans => "/plans",
            Self::Roles => "/roles",
            Self::Permissions => "/permissions",
            Self::Tenants => "/tenants",
            Self::Users => "/users",
            Self::Tickets => "/tickets",
        }
    }
}

/// Builds module clients and the services on top of them
#[derive(Clone)]
pub struct ClientFactory {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
    coordinator: Arc<RefreshCoordinator>,
    bearer: Arc<BearerAuth>,
    refresh: Arc<RefreshOnUnauthorized>,
    plans_ttl: Duration,
}

impl ClientFactory {
    /// Create a new factory builder
    pub fn builder() -> ClientFactoryBuilder {
        ClientFactoryBuilder::default()
    }

    /// Build a factory from loaded configuration
    pub fn from_config(
        config: &ClientConfig,
        credentials: CredentialStore,
    ) -> Result<Self, ClientError> {
        Self::builder()
            .base_url(&config.base_url)
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .max_queue(config.refresh.max_queue)
            .entry_timeout(config.entry_timeout())
            .plans_ttl(config.plans_ttl())
            .credentials(credentials)
            .build()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// A client for one module with bearer auth and refresh-on-401 installed
    pub fn client(&self, module: ApiModule) -> ApiClient {
        ApiClient::builder(
            self.http.clone(),
            format!("{}{}", self.base_url, module.path()),
        )
        .request_interceptor(self.bearer.clone())
        .response_interceptor(self.refresh.clone())
        .build()
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.client(ApiModule::Auth), self.credentials.clone())
    }

    pub fn plans(&self) -> PlanService {
        PlanService::new(
            self.client(ApiModule::Plans),
            self.credentials.storage().clone(),
            self.plans_ttl,
        )
    }

    pub fn roles(&self) -> RoleService {
        RoleService::new(
            self.client(ApiModule::Roles),
            self.client(ApiModule::Permissions),
        )
    }

    pub fn tenants(&self) -> TenantService {
        TenantService::new(self.client(ApiModule::Tenants))
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.client(ApiModule::Users))
    }

    pub fn tickets(&self) -> TicketService {
        TicketService::new(self.client(ApiModule::Tickets))
    }
}

/// Builder for [`ClientFactory`]
#[derive(Default)]
pub struct ClientFactoryBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    credentials: Option<CredentialStore>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    max_queue: Option<usize>,
    entry_timeout: Option<Duration>,
    plans_ttl: Option<Duration>,
}

impl ClientFactoryBuilder {
    /// Set the API root URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the credential store shared by every client
    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replace the default HTTP refresher
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = Some(max_queue);
        self
    }

    pub fn entry_timeout(mut self, timeout: Duration) -> Self {
        self.entry_timeout = Some(timeout);
        self
    }

    pub fn plans_ttl(mut self, ttl: Duration) -> Self {
        self.plans_ttl = Some(ttl);
        self
    }

    /// Build the factory
    pub fn build(self) -> Result<ClientFactory, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let credentials = self
            .credentials
            .ok_or_else(|| ClientError::Configuration("credentials are required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let mut client_builder = ClientBuilder::new().default_headers(headers);
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("posadmin-client/{}", env!("CARGO_PKG_VERSION")));
        let http = client_builder.user_agent(user_agent).build()?;

        let refresher = self
            .refresher
            .unwrap_or_else(|| Arc::new(HttpTokenRefresher::new(http.clone(), &base_url)));
        let coordinator = Arc::new(
            RefreshCoordinator::new(refresher, credentials.clone())
                .with_max_queue(self.max_queue.unwrap_or(DEFAULT_MAX_QUEUE))
                .with_entry_timeout(self.entry_timeout.unwrap_or(DEFAULT_ENTRY_TIMEOUT)),
        );

        Ok(ClientFactory {
            http,
            base_url,
            bearer: Arc::new(BearerAuth::new(credentials.clone())),
            refresh: Arc::new(RefreshOnUnauthorized::new(coordinator.clone())),
            credentials,
            coordinator,
            plans_ttl: self.plans_ttl.unwrap_or(DEFAULT_PLANS_TTL),
        })
    }
}
