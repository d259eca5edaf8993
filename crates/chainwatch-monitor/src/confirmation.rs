//! Receipt waiting raced against the block timeout.

use std::sync::Arc;
use std::time::Duration;

use chainwatch_core::{BlockProvider, ReceiptSource, TransactionReceipt};
use tokio::time;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::watcher::watch_for_block_timeout;

/// Wait until `transaction_hash` has a receipt, or fail with
/// [`MonitorError::BlockTimeout`] if too many blocks pass first.
///
/// The receipt is checked immediately and then every polling interval.
/// The block-timeout watch is cleaned on every exit path.
pub async fn wait_for_receipt<P>(
    provider: Arc<P>,
    config: &MonitorConfig,
    transaction_hash: &str,
) -> Result<TransactionReceipt, MonitorError>
where
    P: BlockProvider + ReceiptSource + ?Sized,
{
    let (failure, handle) =
        watch_for_block_timeout(provider.clone(), config, Some(transaction_hash)).await?;

    let outcome = tokio::select! {
        biased;

        receipt = poll_receipt(&*provider, transaction_hash, config.polling_interval()) => receipt,
        timeout = failure => Err(MonitorError::BlockTimeout(timeout)),
    };
    handle.clean();

    if let Ok(receipt) = &outcome {
        tracing::info!(
            tx = transaction_hash,
            block = ?receipt.block_number,
            success = receipt.is_success(),
            "transaction receipt received"
        );
    }
    outcome
}

async fn poll_receipt<P>(
    provider: &P,
    transaction_hash: &str,
    every: Duration,
) -> Result<TransactionReceipt, MonitorError>
where
    P: ReceiptSource + ?Sized,
{
    loop {
        match provider.transaction_receipt(transaction_hash).await {
            Ok(Some(receipt)) => return Ok(receipt),
            Ok(None) => {}
            Err(e) if e.is_retryable() => {
                tracing::debug!(error = %e, tx = transaction_hash, "receipt poll failed, retrying");
            }
            Err(e) => return Err(MonitorError::Transport(e)),
        }
        time::sleep(every).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{receipt, MockChain};
    use chainwatch_core::{JsonRpcError, TransportError};

    fn config() -> MonitorConfig {
        MonitorConfig::default().with_block_timeout(3)
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_wins_and_watch_is_cleaned() {
        let chain = Arc::new(MockChain::polling([100, 101]).with_receipts([
            Ok(None),
            Err(TransportError::Timeout { ms: 30_000 }),
            Ok(Some(receipt("0xabc", 101))),
        ]));
        let got = wait_for_receipt(chain.clone(), &config(), "0xabc").await.unwrap();
        assert_eq!(got.block_number, Some(101));
        assert!(got.is_success());
        assert_eq!(chain.receipt_calls(), 3);

        let polls = chain.block_number_calls();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(chain.block_number_calls(), polls, "timeout watch must stop after the receipt");
    }

    #[tokio::test(start_paused = true)]
    async fn block_timeout_wins_when_never_mined() {
        let chain = Arc::new(MockChain::polling([100, 101, 102, 103]));
        let err = wait_for_receipt(chain.clone(), &config(), "0xdead").await.unwrap_err();
        match err {
            MonitorError::BlockTimeout(e) => {
                assert_eq!(e.number_of_blocks, 3);
                assert_eq!(e.transaction_hash.as_deref(), Some("0xdead"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let receipts = chain.receipt_calls();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(chain.receipt_calls(), receipts);
    }

    #[tokio::test(start_paused = true)]
    async fn node_error_is_returned() {
        let chain = Arc::new(MockChain::polling([100]).with_receipts([Err(TransportError::Rpc(
            JsonRpcError { code: -32602, message: "invalid argument".into(), data: None },
        ))]));
        let err = wait_for_receipt(chain, &config(), "0xnothex").await.unwrap_err();
        assert!(matches!(err, MonitorError::Transport(TransportError::Rpc(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_over_subscription_session() {
        let chain = Arc::new(MockChain::subscribing([100]).with_receipts([
            Ok(None),
            Ok(Some(receipt("0xabc", 101))),
        ]));
        let got = wait_for_receipt(chain.clone(), &config(), "0xabc").await.unwrap();
        assert_eq!(got.transaction_hash, "0xabc");
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(chain.unsubscribes(), 1);
    }
}
