//! Push-based auth state stream.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::{AuthChangeEvent, AuthStateChange, Session};

/// Buffered changes per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 32;

/// Fan-out of auth state changes to every live subscription.
#[derive(Debug, Clone)]
pub struct AuthEventBus {
    sender: broadcast::Sender<AuthStateChange>,
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish a change. Nobody listening is not an error.
    pub fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        let receivers = self
            .sender
            .send(AuthStateChange { event, session })
            .unwrap_or(0);
        debug!(%event, receivers, "Auth state change emitted");
    }

    /// Open a subscription that sees every change emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live auth state subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthStateChange>,
}

impl AuthSubscription {
    /// Next change, or `None` once the client is gone.
    ///
    /// A subscriber that falls behind skips to the oldest retained change.
    pub async fn recv(&mut self) -> Option<AuthStateChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth subscription lagged, skipping changes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
