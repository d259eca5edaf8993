//! What a caller holds while a watch runs: the failure future and the
//! handle that releases the session's timer and subscription.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::BlockTimeoutError;
use crate::session::{Session, SessionPhase, WatchMode};

/// Resolves with the [`BlockTimeoutError`] when the transaction stalls.
///
/// There is no success value: if the session is cleaned first, this future
/// stays pending forever. Race it against your own confirmation path.
#[derive(Debug)]
pub struct BlockTimeoutFailure {
    rx: oneshot::Receiver<BlockTimeoutError>,
    settled: bool,
}

impl BlockTimeoutFailure {
    pub(crate) fn new(rx: oneshot::Receiver<BlockTimeoutError>) -> Self {
        Self { rx, settled: false }
    }

    /// Take the error if the timeout already fired, without waiting.
    pub fn try_take(&mut self) -> Option<BlockTimeoutError> {
        if self.settled {
            return None;
        }
        let err = self.rx.try_recv().ok()?;
        self.settled = true;
        Some(err)
    }
}

impl Future for BlockTimeoutFailure {
    type Output = BlockTimeoutError;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.settled {
            return Poll::Pending;
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(err)) => {
                self.settled = true;
                Poll::Ready(err)
            }
            // Sender dropped by `clean()`: the session will never fail.
            Poll::Ready(Err(_)) => {
                self.settled = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Owner of a running watch session.
///
/// Call [`clean`](Self::clean) once the outcome no longer matters, on the
/// success path as well as on error. Dropping the handle does not stop the
/// session.
#[must_use = "a watch keeps its timer or subscription until `clean()` is called"]
pub struct WatcherHandle {
    session: Arc<Session>,
    task: AbortHandle,
}

impl WatcherHandle {
    pub(crate) fn new(session: Arc<Session>, task: AbortHandle) -> Self {
        Self { session, task }
    }

    /// Stop the watch and release its interval and/or subscription.
    ///
    /// Idempotent, and a no-op after the timeout has fired.
    pub fn clean(&self) {
        if self.session.clean() {
            tracing::debug!(
                starter = self.session.starter_block_number(),
                mode = %self.session.mode(),
                "block timeout watch cleaned"
            );
        }
        // Dropping the task drops its subscription, which unsubscribes.
        self.task.abort();
    }

    pub fn mode(&self) -> WatchMode {
        self.session.mode()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn starter_block_number(&self) -> u64 {
        self.session.starter_block_number()
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        self.session.transaction_hash()
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("starter", &self.starter_block_number())
            .field("mode", &self.mode())
            .field("phase", &self.phase())
            .finish()
    }
}
