//! Single-flight access token refresh
//!
//! At most one call to the refresh endpoint is in flight at a time. Callers
//! that ask for a token while a refresh is running are queued and all receive
//! the outcome of that one call. The queue is bounded and every queued caller
//! has its own deadline.

use super::error::ClientError;
use super::interceptor::{
    ResponseAction, ResponseContext, ResponseInterceptor, bearer_token, set_bearer,
};
use async_trait::async_trait;
use posadmin_core::types::{ApiEnvelope, RefreshRequest, TokenPair};
use posadmin_core::{AuthEvent, CredentialStore};
use reqwest::{Response, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_QUEUE: usize = 50;
pub const DEFAULT_ENTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a token could not be obtained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("No refresh token stored")]
    NoRefreshToken,

    #[error("Refresh queue is full ({max} callers waiting)")]
    QueueFull { max: usize },

    #[error("Timed out waiting for token refresh")]
    Timeout,

    #[error("Token refresh failed: {0}")]
    Failed(String),

    #[error("Token refresh was abandoned before completing")]
    Abandoned,
}

/// Performs the actual refresh call
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError>;
}

/// Refreshes tokens against `POST {base}/auth/refresh`
///
/// Uses a bare HTTP client so the refresh call never passes through the
/// interceptors and can never trigger a nested refresh.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{}/auth/refresh", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let response = self
            .http
            .post(&self.url)
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(|e| RefreshError::Failed(format!("network error: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RefreshError::Failed(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(RefreshError::Failed(
                ClientError::from_response(status, &body).to_string(),
            ));
        }

        let envelope: ApiEnvelope<TokenPair> = serde_json::from_str(&body)
            .map_err(|e| RefreshError::Failed(format!("malformed response: {e}")))?;
        if !envelope.success {
            return Err(RefreshError::Failed(envelope.failure_message()));
        }
        envelope
            .data
            .ok_or_else(|| RefreshError::Failed("response carried no tokens".into()))
    }
}

type Outcome = Result<String, RefreshError>;

struct PendingEntry {
    id: u64,
    enqueued_at: Instant,
    tx: oneshot::Sender<Outcome>,
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    queue: VecDeque<PendingEntry>,
    next_id: u64,
}

enum Role {
    Leader,
    Waiter(u64, oneshot::Receiver<Outcome>),
}

/// Coordinates token refreshes for every client sharing a session
pub struct RefreshCoordinator {
    refresher: Arc<dyn TokenRefresher>,
    credentials: CredentialStore,
    max_queue: usize,
    entry_timeout: Duration,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn TokenRefresher>, credentials: CredentialStore) -> Self {
        Self {
            refresher,
            credentials,
            max_queue: DEFAULT_MAX_QUEUE,
            entry_timeout: DEFAULT_ENTRY_TIMEOUT,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Maximum number of callers allowed to wait on an in-flight refresh
    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue;
        self
    }

    /// How long a queued caller waits before it is rejected
    pub fn with_entry_timeout(mut self, timeout: Duration) -> Self {
        self.entry_timeout = timeout;
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Obtain a fresh access token.
    ///
    /// Starts a refresh when none is running, otherwise waits for the running
    /// one. Fails immediately with [`RefreshError::QueueFull`] when the wait
    /// queue is at capacity.
    pub async fn refresh_token(&self) -> Result<String, RefreshError> {
        let role = {
            let mut state = self.lock();
            if state.in_flight {
                if state.queue.len() >= self.max_queue {
                    warn!(max = self.max_queue, "Refresh queue full, rejecting caller");
                    return Err(RefreshError::QueueFull {
                        max: self.max_queue,
                    });
                }
                let (tx, rx) = oneshot::channel();
                let id = state.next_id;
                state.next_id += 1;
                state.queue.push_back(PendingEntry {
                    id,
                    enqueued_at: Instant::now(),
                    tx,
                });
                debug!(id, queued = state.queue.len(), "Waiting on in-flight refresh");
                Role::Waiter(id, rx)
            } else {
                state.in_flight = true;
                Role::Leader
            }
        };

        match role {
            Role::Leader => self.lead().await,
            Role::Waiter(id, rx) => self.wait(id, rx).await,
        }
    }

    async fn wait(&self, id: u64, mut rx: oneshot::Receiver<Outcome>) -> Outcome {
        match tokio::time::timeout(self.entry_timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RefreshError::Abandoned),
            Err(_) => {
                let removed = {
                    let mut state = self.lock();
                    let before = state.queue.len();
                    state.queue.retain(|entry| entry.id != id);
                    state.queue.len() != before
                };
                if removed {
                    warn!(id, timeout = ?self.entry_timeout, "Queued refresh caller timed out");
                    return Err(RefreshError::Timeout);
                }
                // Drained between the deadline and taking the lock
                rx.try_recv().unwrap_or(Err(RefreshError::Timeout))
            }
        }
    }

    async fn lead(&self) -> Outcome {
        let mut guard = InFlightGuard {
            coordinator: self,
            settled: false,
        };
        let outcome = self.perform().await;
        guard.settle(&outcome);
        outcome
    }

    async fn perform(&self) -> Outcome {
        let Some(refresh_token) = self.credentials.refresh_token() else {
            return self.fail(RefreshError::NoRefreshToken);
        };

        debug!("Refreshing access token");
        match self.refresher.refresh(&refresh_token).await {
            Ok(pair) if pair.access_token.is_empty() => {
                self.fail(RefreshError::Failed("response carried an empty access token".into()))
            }
            Ok(pair) => {
                if let Err(e) = self
                    .credentials
                    .update_tokens(&pair.access_token, pair.refresh_token.as_deref())
                {
                    return self.fail(RefreshError::Failed(format!("storing tokens: {e}")));
                }
                info!("Access token refreshed");
                Ok(pair.access_token)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Terminal failure: wipe the session and ask for a new login
    fn fail(&self, err: RefreshError) -> Outcome {
        warn!(error = %err, "Token refresh failed, clearing session");
        if let Err(e) = self.credentials.clear() {
            error!(error = %e, "Failed to clear stored credentials");
        }
        self.credentials.events().emit(AuthEvent::LoginRequired);
        Err(err)
    }

    /// Clear the in-flight flag and hand the outcome to every queued caller,
    /// oldest first
    fn drain(&self, outcome: &Outcome) {
        let queue = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.queue)
        };
        if !queue.is_empty() {
            debug!(count = queue.len(), ok = outcome.is_ok(), "Draining refresh queue");
        }
        for entry in queue {
            debug!(id = entry.id, waited = ?entry.enqueued_at.elapsed(), "Releasing queued caller");
            let _ = entry.tx.send(outcome.clone());
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("max_queue", &self.max_queue)
            .field("entry_timeout", &self.entry_timeout)
            .finish_non_exhaustive()
    }
}

/// Resets the in-flight flag even if the leading future is dropped mid-refresh
struct InFlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlightGuard<'_> {
    fn settle(&mut self, outcome: &Outcome) {
        self.settled = true;
        self.coordinator.drain(outcome);
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh cancelled before completing");
            self.coordinator.drain(&Err(RefreshError::Abandoned));
        }
    }
}

/// Refreshes the session on `401 Unauthorized` and replays the request once
pub struct RefreshOnUnauthorized {
    coordinator: Arc<RefreshCoordinator>,
}

/// Endpoints whose 401 means bad credentials rather than an expired token
const EXEMPT_PATHS: [&str; 2] = ["/auth/login", "/auth/refresh"];

impl RefreshOnUnauthorized {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ResponseInterceptor for RefreshOnUnauthorized {
    async fn on_response(
        &self,
        ctx: ResponseContext<'_>,
        response: Response,
    ) -> Result<ResponseAction, ClientError> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(ResponseAction::Pass(response));
        }
        if ctx.retried {
            debug!(url = %response.url(), "Replayed request still unauthorized");
            return Ok(ResponseAction::Pass(response));
        }
        let Some(sent) = ctx.request else {
            return Ok(ResponseAction::Pass(response));
        };
        if EXEMPT_PATHS.iter().any(|p| sent.url().path().ends_with(p)) {
            return Ok(ResponseAction::Pass(response));
        }
        let Some(mut replay) = sent.try_clone() else {
            return Ok(ResponseAction::Pass(response));
        };

        let current = self.coordinator.credentials().access_token();
        let token = match current {
            // A refresh finished while this request was in flight
            Some(current) if bearer_token(sent) != Some(current.as_str()) => {
                debug!(url = %sent.url(), "Token changed since request was sent, replaying");
                current
            }
            _ => match self.coordinator.refresh_token().await {
                Ok(token) => token,
                Err(err) => {
                    warn!(url = %sent.url(), error = %err, "Could not refresh session");
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ClientError::from_response(status, &body));
                }
            },
        };

        set_bearer(&mut replay, &token)?;
        Ok(ResponseAction::Retry(replay))
    }
}
