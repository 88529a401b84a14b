//! Admin API HTTP client

pub mod error;
pub mod factory;
pub mod interceptor;
pub mod refresh;

pub use error::{ClientError, ErrorCategory};
pub use factory::{ApiModule, ClientFactory, ClientFactoryBuilder};
pub use interceptor::{
    BearerAuth, RequestInterceptor, ResponseAction, ResponseContext, ResponseInterceptor,
};
pub use refresh::{
    HttpTokenRefresher, RefreshCoordinator, RefreshError, RefreshOnUnauthorized, TokenRefresher,
};

use posadmin_core::types::ApiEnvelope;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// REST client for one API module
///
/// Every request passes through the request interceptors before it is sent,
/// and every response through the response interceptors before the caller
/// sees it. A response interceptor may ask for the request to be replayed;
/// each request is replayed at most once.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    request_interceptors: Arc<Vec<Arc<dyn RequestInterceptor>>>,
    response_interceptors: Arc<Vec<Arc<dyn ResponseInterceptor>>>,
}

impl ApiClient {
    /// Create a client builder for `base_url`
    pub fn builder(http: Client, base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            http,
            base_url: base_url.into(),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a request builder for a path relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, url)
    }

    /// Create a request builder for path segments below the base URL.
    ///
    /// Each segment is percent-encoded, so ids containing `/`, `?` or `#`
    /// stay inside their segment.
    pub fn request_to(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, ClientError> {
        let invalid = || ClientError::Configuration(format!("invalid base URL {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(self.http.request(method, url))
    }

    /// Send a request through the interceptor chain
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let mut request = request.build()?;
        let mut retried = false;

        loop {
            for interceptor in self.request_interceptors.iter() {
                interceptor.before_request(&mut request)?;
            }
            let sent = request.try_clone();
            debug!(method = %request.method(), url = %request.url(), retried, "Sending request");

            let response = self.http.execute(request).await?;
            match self.intercept(sent.as_ref(), retried, response).await? {
                ResponseAction::Pass(response) => return Ok(response),
                ResponseAction::Retry(next) if !retried => {
                    retried = true;
                    request = next;
                }
                ResponseAction::Retry(_) => {
                    return Err(ClientError::AuthenticationFailed(
                        "request was already retried".into(),
                    ));
                }
            }
        }
    }

    async fn intercept(
        &self,
        sent: Option<&reqwest::Request>,
        retried: bool,
        mut response: Response,
    ) -> Result<ResponseAction, ClientError> {
        for interceptor in self.response_interceptors.iter() {
            let ctx = ResponseContext {
                request: sent,
                retried,
            };
            match interceptor.on_response(ctx, response).await? {
                ResponseAction::Pass(passed) => response = passed,
                retry @ ResponseAction::Retry(_) => return Ok(retry),
            }
        }
        Ok(ResponseAction::Pass(response))
    }

    /// Send a request and decode the envelope's `data`
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let status = response.status();
        read_data::<T>(response).await?.ok_or_else(|| ClientError::Api {
            status: status.as_u16(),
            message: "response carried no data".into(),
        })
    }

    /// Send a request whose success carries no payload
    pub async fn execute_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        let response = self.send(request).await?;
        read_data::<serde_json::Value>(response).await?;
        Ok(())
    }
}

/// Check the status and envelope of a response and return its `data`
async fn read_data<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ClientError::from_response(status, &body));
    }
    if body.trim().is_empty() {
        return Ok(None);
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
    if !envelope.success {
        return Err(ClientError::from_envelope(status, &envelope));
    }
    Ok(envelope.data)
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    http: Client,
    base_url: String,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl ApiClientBuilder {
    /// Add a hook run on every outgoing request
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Add a hook run on every response
    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> ApiClient {
        ApiClient {
            http: self.http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            request_interceptors: Arc::new(self.request_interceptors),
            response_interceptors: Arc::new(self.response_interceptors),
        }
    }
}
