//! chainwatch-monitor — detect transactions that are not mined in time.
//!
//! # Overview
//!
//! A watch records the chain height when it starts and fails once a
//! configured number of blocks has elapsed. New blocks are learned from a
//! `newHeads` subscription when the transport supports it, or by polling
//! `eth_blockNumber` otherwise. A subscription that errors, closes, or stays
//! silent past the setup timeout is replaced by polling, once.
//!
//! ```text
//! watch_for_block_timeout ─┬─ supports_subscriptions ─► subscription watcher ─(revert)─┐
//!                          └─ otherwise ──────────────► polling watcher ◄──────────────┘
//! ```
//!
//! Each watch yields a [`BlockTimeoutFailure`] (resolves only with a
//! [`BlockTimeoutError`]) and a [`WatcherHandle`] whose `clean()` releases the
//! timer and subscription. [`wait_for_receipt`] is the usual caller: it races
//! receipt polling against the failure and cleans up either way.

pub mod config;
pub mod confirmation;
pub mod error;
pub mod handle;
mod polling;
pub mod session;
mod subscription;
pub mod watcher;

#[cfg(test)]
mod mock;

pub use config::MonitorConfig;
pub use confirmation::wait_for_receipt;
pub use error::{BlockTimeoutError, MonitorError, ERR_TX_BLOCK_TIMEOUT};
pub use handle::{BlockTimeoutFailure, WatcherHandle};
pub use session::{SessionPhase, WatchMode};
pub use watcher::{watch_for_block_timeout, BlockTimeoutWatcher};
