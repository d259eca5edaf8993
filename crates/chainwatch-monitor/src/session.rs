//! Monitoring session state shared between a watcher task and its handle.
//!
//! State transitions:
//! - `Subscribing` → `Polling`: reversion, at most once
//! - `Active` → `Rejected`:     threshold reached
//! - `Active` → `Cleaned`:      caller abandoned the watch
//!
//! `Rejected` and `Cleaned` are terminal and exclusive. Both take the
//! oneshot sender out of the state, so whichever happens first wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::BlockTimeoutError;
use crate::handle::BlockTimeoutFailure;

/// How a session currently learns about new blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Querying the block number at a fixed interval.
    Polling,
    /// Receiving `newHeads` notifications.
    Subscribing,
}

impl std::fmt::Display for WatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::Subscribing => write!(f, "subscribing"),
        }
    }
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    /// The block timeout fired.
    Rejected,
    /// The caller called `clean()` first.
    Cleaned,
}

struct SessionState {
    phase: SessionPhase,
    mode: WatchMode,
    reject: Option<oneshot::Sender<BlockTimeoutError>>,
}

pub(crate) struct Session {
    starter_block_number: u64,
    block_timeout: u64,
    transaction_hash: Option<String>,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        starter_block_number: u64,
        block_timeout: u64,
        transaction_hash: Option<String>,
        mode: WatchMode,
    ) -> (Arc<Self>, BlockTimeoutFailure) {
        let (tx, rx) = oneshot::channel();
        let session = Arc::new(Self {
            starter_block_number,
            block_timeout,
            transaction_hash,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Active,
                mode,
                reject: Some(tx),
            }),
        });
        (session, BlockTimeoutFailure::new(rx))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn starter_block_number(&self) -> u64 {
        self.starter_block_number
    }

    pub(crate) fn transaction_hash(&self) -> Option<&str> {
        self.transaction_hash.as_deref()
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub(crate) fn mode(&self) -> WatchMode {
        self.state().mode
    }

    pub(crate) fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    /// Blocks elapsed since the start. Heights below the starter (a reorg,
    /// a lagging node) count as zero.
    pub(crate) fn elapsed(&self, height: u64) -> u64 {
        height.saturating_sub(self.starter_block_number)
    }

    /// Feed an observed chain height into the session.
    ///
    /// Rejects the failure future if the threshold is reached. Returns
    /// `true` once the session is over, so the caller can stop watching.
    pub(crate) fn observe_height(&self, height: u64) -> bool {
        let elapsed = self.elapsed(height);
        let mut state = self.state();
        if state.phase != SessionPhase::Active {
            return true;
        }
        if elapsed < self.block_timeout {
            tracing::trace!(height, elapsed, "block observed");
            return false;
        }
        state.phase = SessionPhase::Rejected;
        if let Some(tx) = state.reject.take() {
            tracing::info!(
                starter = self.starter_block_number,
                elapsed,
                tx = ?self.transaction_hash,
                mode = %state.mode,
                "transaction block timeout reached"
            );
            let _ = tx.send(BlockTimeoutError {
                starter_block_number: self.starter_block_number,
                number_of_blocks: elapsed,
                transaction_hash: self.transaction_hash.clone(),
            });
        }
        true
    }

    /// Switch from `Subscribing` to `Polling`.
    ///
    /// Returns `false` if the session already polls or is no longer active.
    pub(crate) fn revert_to_polling(&self) -> bool {
        let mut state = self.state();
        if state.phase != SessionPhase::Active || state.mode == WatchMode::Polling {
            return false;
        }
        state.mode = WatchMode::Polling;
        true
    }

    /// Mark the session abandoned. Returns `true` only for the call that
    /// actually ended an active session.
    pub(crate) fn clean(&self) -> bool {
        let mut state = self.state();
        if state.phase != SessionPhase::Active {
            return false;
        }
        state.phase = SessionPhase::Cleaned;
        state.reject = None;
        true
    }
}
