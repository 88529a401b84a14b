//! Request and response hooks applied uniformly by [`ApiClient`](super::ApiClient)

use super::error::ClientError;
use async_trait::async_trait;
use posadmin_core::CredentialStore;
use reqwest::header::{self, HeaderValue};
use reqwest::{Request, Response};

/// Hook run on every outgoing request, including replays
pub trait RequestInterceptor: Send + Sync {
    fn before_request(&self, request: &mut Request) -> Result<(), ClientError>;
}

/// What the client should do with a response after an interceptor saw it
#[derive(Debug)]
pub enum ResponseAction {
    /// Hand the response on (to the next interceptor, then the caller)
    Pass(Response),
    /// Discard the response and send this request instead
    Retry(Request),
}

/// The request a response belongs to
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    /// Copy of the request as sent; `None` when the body could not be cloned
    pub request: Option<&'a Request>,
    /// Whether this response is already for a replayed request
    pub retried: bool,
}

/// Hook run on every response before it reaches the caller
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn on_response(
        &self,
        ctx: ResponseContext<'_>,
        response: Response,
    ) -> Result<ResponseAction, ClientError>;
}

/// Attaches the stored access token as a bearer credential
#[derive(Debug, Clone)]
pub struct BearerAuth {
    credentials: CredentialStore,
}

impl BearerAuth {
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }
}

impl RequestInterceptor for BearerAuth {
    fn before_request(&self, request: &mut Request) -> Result<(), ClientError> {
        if let Some(token) = self.credentials.access_token() {
            set_bearer(request, &token)?;
        }
        Ok(())
    }
}

/// Replace the `Authorization` header with a bearer token
pub fn set_bearer(request: &mut Request, token: &str) -> Result<(), ClientError> {
    let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        ClientError::Configuration("access token is not a valid header value".into())
    })?;
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}

/// The bearer token a request carries, if any
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use posadmin_core::{AuthEvents, MemoryStorage};
    use reqwest::Method;
    use std::sync::Arc;

    fn request() -> Request {
        Request::new(Method::GET, "http://localhost/api/v1/plans".parse().unwrap())
    }

    #[test]
    fn test_bearer_attached_when_token_stored() {
        let credentials =
            CredentialStore::new(Arc::new(MemoryStorage::new()), AuthEvents::new());
        let auth = BearerAuth::new(credentials.clone());

        let mut anonymous = request();
        auth.before_request(&mut anonymous).unwrap();
        assert!(bearer_token(&anonymous).is_none());

        credentials.set_session("tok-1", Some("ref-1"), None).unwrap();
        let mut authed = request();
        auth.before_request(&mut authed).unwrap();
        assert_eq!(bearer_token(&authed), Some("tok-1"));
    }

    #[test]
    fn test_set_bearer_replaces_existing_header() {
        let mut req = request();
        set_bearer(&mut req, "old").unwrap();
        set_bearer(&mut req, "new").unwrap();
        assert_eq!(bearer_token(&req), Some("new"));
        assert_eq!(req.headers().get_all(header::AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let mut req = request();
        let err = set_bearer(&mut req, "bad\ntoken").unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
