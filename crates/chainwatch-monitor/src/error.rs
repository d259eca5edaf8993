//! Error types for transaction monitoring.

use chainwatch_core::TransportError;
use thiserror::Error;

/// Error code carried by [`BlockTimeoutError`].
pub const ERR_TX_BLOCK_TIMEOUT: i32 = 426;

/// A transaction was not mined within the allowed number of blocks.
///
/// This is the only failure a watch session ever reports. The transaction
/// may still be mined later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Transaction started at {starter_block_number} but was not mined within {number_of_blocks} blocks. \
     Please make sure your transaction was properly sent and there are no previous pending transaction \
     for the same account. However, be aware that it might still be mined!{}",
    hash_suffix(.transaction_hash)
)]
pub struct BlockTimeoutError {
    /// Chain height when the watch started.
    pub starter_block_number: u64,
    /// Blocks elapsed since `starter_block_number` when the timeout fired.
    pub number_of_blocks: u64,
    pub transaction_hash: Option<String>,
}

fn hash_suffix(hash: &Option<String>) -> String {
    hash.as_deref()
        .map(|h| format!(" Transaction Hash: {h}"))
        .unwrap_or_default()
}

impl BlockTimeoutError {
    pub fn code(&self) -> i32 {
        ERR_TX_BLOCK_TIMEOUT
    }
}

/// Errors returned by the monitor's entry points.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The starting block number could not be fetched; no session was started.
    #[error("failed to fetch starting block number: {0}")]
    StarterBlock(#[source] TransportError),

    #[error(transparent)]
    BlockTimeout(#[from] BlockTimeoutError),

    /// A non-transient transport failure while waiting for a receipt.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
}

impl MonitorError {
    /// Returns `true` if the transaction stalled (as opposed to a transport failure).
    pub fn is_block_timeout(&self) -> bool {
        matches!(self, Self::BlockTimeout(_))
    }
}
