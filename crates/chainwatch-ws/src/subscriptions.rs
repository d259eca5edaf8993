//! WebSocket subscription routing.
//!
//! Maps `eth_subscribe` ids to the channel of the consumer that owns the
//! subscription. When the connection drops every live subscription receives
//! an `Error` event and is forgotten; consumers decide how to recover.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chainwatch_core::{SubscriptionEvent, SubscriptionId};
use serde_json::Value;
use tokio::sync::mpsc;

struct SubscriptionEntry {
    /// The subscription type (e.g. `"newHeads"`, `"logs"`).
    kind: String,
    sender: mpsc::UnboundedSender<SubscriptionEvent>,
}

/// Routes notifications to live subscriptions.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    entries: Arc<Mutex<HashMap<SubscriptionId, SubscriptionEntry>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SubscriptionId, SubscriptionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscription and return its event channel.
    pub fn register(
        &self,
        id: SubscriptionId,
        kind: impl Into<String>,
    ) -> mpsc::UnboundedReceiver<SubscriptionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries().insert(
            id,
            SubscriptionEntry {
                kind: kind.into(),
                sender: tx,
            },
        );
        rx
    }

    /// Forward a notification payload. Entries whose consumer has gone
    /// away are dropped.
    pub fn dispatch(&self, id: &SubscriptionId, payload: Value) {
        let mut entries = self.entries();
        let Some(entry) = entries.get(id) else {
            tracing::debug!(subscription = %id, "notification for unknown subscription");
            return;
        };
        if entry.sender.send(SubscriptionEvent::Data(payload)).is_err() {
            entries.remove(id);
        }
    }

    /// Forget a subscription. Returns `true` if it was live.
    pub fn remove(&self, id: &SubscriptionId) -> bool {
        self.entries().remove(id).is_some()
    }

    /// Deliver `reason` as an error to every subscription and forget them all.
    /// Returns how many were failed.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = self.entries().drain().collect();
        for (id, entry) in &drained {
            tracing::debug!(subscription = %id, kind = %entry.kind, reason, "failing subscription");
            let _ = entry.sender.send(SubscriptionEvent::Error(reason.to_string()));
        }
        drained.len()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
