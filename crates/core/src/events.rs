//! Authentication state notifications

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Changes in authentication state observed by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Credentials were stored or cleared
    StateChanged { logged_in: bool },
    /// The session cannot be recovered and the operator must log in again
    LoginRequired,
}

/// Broadcast bus for [`AuthEvent`]s
///
/// Cloning yields another handle onto the same channel. Emitting with no
/// subscribers is a no-op.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: AuthEvent) {
        tracing::debug!(?event, "Auth event");
        let _ = self.sender.send(event);
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}
