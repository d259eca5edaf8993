//! Subscription timeout watcher.
//!
//! Counts blocks from `newHeads` notifications. Reverts to polling, once,
//! when the subscription errors, closes, or stays silent past the setup
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use chainwatch_core::{BlockHeader, BlockProvider, Subscription, SubscriptionEvent};
use serde_json::Value;
use tokio::time;

use crate::config::MonitorConfig;
use crate::handle::WatcherHandle;
use crate::polling;
use crate::session::Session;

/// Why a subscription session gave up on its feed.
#[derive(Debug)]
enum Reversion {
    Error(String),
    Closed,
    Silent(Duration),
}

impl std::fmt::Display for Reversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(e) => write!(f, "subscription error: {e}"),
            Self::Closed => write!(f, "subscription closed by transport"),
            Self::Silent(after) => write!(f, "no header within {after:?}"),
        }
    }
}

/// Open a `newHeads` subscription for the session, falling back to a
/// polling session if the subscribe call fails.
pub(crate) async fn spawn<P>(provider: Arc<P>, session: Arc<Session>, config: &MonitorConfig) -> WatcherHandle
where
    P: BlockProvider + ?Sized,
{
    let every = config.polling_interval();
    let subscription = match provider.subscribe_new_heads().await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(
                error = %e,
                starter = session.starter_block_number(),
                "newHeads subscription failed, watching by polling"
            );
            session.revert_to_polling();
            return polling::spawn(provider, session, every);
        }
    };

    let task = tokio::spawn(watch_headers(
        provider,
        subscription,
        session.clone(),
        every,
        config.header_setup_timeout(),
    ));
    WatcherHandle::new(session, task.abort_handle())
}

async fn watch_headers<P>(
    provider: Arc<P>,
    mut subscription: Subscription,
    session: Arc<Session>,
    every: Duration,
    setup_timeout: Duration,
) where
    P: BlockProvider + ?Sized,
{
    let setup_deadline = time::sleep(setup_timeout);
    tokio::pin!(setup_deadline);
    // Cleared by the first header or error so the deadline cannot revert twice.
    let mut awaiting_first_signal = true;

    let reason = loop {
        tokio::select! {
            biased;

            event = subscription.next_event() => match event {
                Some(SubscriptionEvent::Data(payload)) => {
                    awaiting_first_signal = false;
                    let Some(number) = header_number(payload) else {
                        tracing::debug!(subscription = %subscription.id(), "header without number ignored");
                        continue;
                    };
                    if session.observe_height(number) {
                        subscription.unsubscribe();
                        return;
                    }
                }
                Some(SubscriptionEvent::Error(e)) => {
                    awaiting_first_signal = false;
                    break Reversion::Error(e);
                }
                None => break Reversion::Closed,
            },
            () = &mut setup_deadline, if awaiting_first_signal => {
                break Reversion::Silent(setup_timeout);
            }
        }
    };

    subscription.unsubscribe();
    if !session.revert_to_polling() {
        return;
    }
    tracing::warn!(
        reason = %reason,
        starter = session.starter_block_number(),
        "reverting block timeout watch to polling"
    );
    polling::poll_until_timeout(provider, session, every).await;
}

fn header_number(payload: Value) -> Option<u64> {
    serde_json::from_value::<BlockHeader>(payload).ok()?.number
}
