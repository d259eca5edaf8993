//! Block-timeout orchestrator — picks subscription or polling per watch.

use std::sync::Arc;

use chainwatch_core::BlockProvider;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::handle::{BlockTimeoutFailure, WatcherHandle};
use crate::session::{Session, WatchMode};
use crate::{polling, subscription};

/// Start watching for a block timeout.
///
/// Fetches the starting block number (a failure here is returned and no
/// session starts), then watches by `newHeads` subscription when the
/// provider supports it and by polling otherwise.
///
/// The caller must eventually call [`WatcherHandle::clean`].
pub async fn watch_for_block_timeout<P>(
    provider: Arc<P>,
    config: &MonitorConfig,
    transaction_hash: Option<&str>,
) -> Result<(BlockTimeoutFailure, WatcherHandle), MonitorError>
where
    P: BlockProvider + ?Sized,
{
    let starter_block_number = provider
        .block_number()
        .await
        .map_err(MonitorError::StarterBlock)?;

    let mode = if provider.supports_subscriptions() {
        WatchMode::Subscribing
    } else {
        WatchMode::Polling
    };

    tracing::info!(
        starter = starter_block_number,
        block_timeout = config.block_timeout,
        tx = ?transaction_hash,
        %mode,
        "watching for block timeout"
    );

    let (session, failure) = Session::new(
        starter_block_number,
        config.block_timeout,
        transaction_hash.map(str::to_owned),
        mode,
    );

    let handle = match mode {
        WatchMode::Subscribing => subscription::spawn(provider, session, config).await,
        WatchMode::Polling => polling::spawn(provider, session, config.polling_interval()),
    };
    Ok((failure, handle))
}

/// A provider and config pair that starts block-timeout watches on demand.
pub struct BlockTimeoutWatcher<P: ?Sized> {
    provider: Arc<P>,
    config: MonitorConfig,
}

impl<P: BlockProvider + ?Sized> BlockTimeoutWatcher<P> {
    pub fn new(provider: Arc<P>, config: MonitorConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// See [`watch_for_block_timeout`].
    pub async fn watch(
        &self,
        transaction_hash: Option<&str>,
    ) -> Result<(BlockTimeoutFailure, WatcherHandle), MonitorError> {
        watch_for_block_timeout(self.provider.clone(), &self.config, transaction_hash).await
    }
}

impl<P: ?Sized> Clone for BlockTimeoutWatcher<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            config: self.config.clone(),
        }
    }
}
