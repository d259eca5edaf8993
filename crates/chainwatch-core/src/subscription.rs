//! Typed push-subscription channel.
//!
//! A transport that supports `eth_subscribe` hands out a [`Subscription`]:
//! the receiving end of a channel of [`SubscriptionEvent`]s plus a hook that
//! deregisters it. Dropping the subscription deregisters it too.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

/// A unique subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One event delivered on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// A notification payload (`params.result` of `eth_subscription`).
    Data(Value),
    /// The subscription failed; no further data will follow.
    Error(String),
}

/// Deregisters a subscription with the transport that created it.
///
/// Implementations are fire-and-forget: they must not block and must not
/// surface failures.
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: &SubscriptionId);
}

/// A live subscription owned by exactly one consumer.
pub struct Subscription {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    unsubscriber: Option<Arc<dyn Unsubscribe>>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        events: mpsc::UnboundedReceiver<SubscriptionEvent>,
        unsubscriber: Arc<dyn Unsubscribe>,
    ) -> Self {
        Self {
            id,
            events,
            unsubscriber: Some(unsubscriber),
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Wait for the next event. `None` once the transport has dropped its
    /// sending side, which consumers should treat like an error.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    /// Deregister the subscription. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(unsubscriber) = self.unsubscriber.take() {
            tracing::debug!(subscription = %self.id, "unsubscribing");
            unsubscriber.unsubscribe(&self.id);
            self.events.close();
        }
    }

    /// `true` until [`unsubscribe`](Self::unsubscribe) is called.
    pub fn is_active(&self) -> bool {
        self.unsubscriber.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
