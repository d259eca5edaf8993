//! Narrow capabilities the transaction monitor consumes.
//!
//! Transports implement these so the monitor never has to know how a block
//! number or a header actually reaches it.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::subscription::Subscription;
use crate::types::TransactionReceipt;

/// Returns the current chain height on demand (`eth_blockNumber`).
#[async_trait]
pub trait BlockNumberSource: Send + Sync + 'static {
    async fn block_number(&self) -> Result<u64, TransportError>;
}

/// Pushes newly observed block headers (`eth_subscribe("newHeads")`).
#[async_trait]
pub trait HeaderFeed: Send + Sync + 'static {
    /// Whether [`subscribe_new_heads`](Self::subscribe_new_heads) can succeed at all.
    fn supports_subscriptions(&self) -> bool;

    /// Open a `newHeads` subscription. Each `Data` event carries a header object.
    async fn subscribe_new_heads(&self) -> Result<Subscription, TransportError>;
}

/// Looks up transaction receipts (`eth_getTransactionReceipt`).
#[async_trait]
pub trait ReceiptSource: Send + Sync + 'static {
    /// `Ok(None)` while the transaction is still pending or unknown.
    async fn transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, TransportError>;
}

/// Everything a block-timeout watch needs from a provider.
pub trait BlockProvider: BlockNumberSource + HeaderFeed {}

impl<T: BlockNumberSource + HeaderFeed + ?Sized> BlockProvider for T {}
