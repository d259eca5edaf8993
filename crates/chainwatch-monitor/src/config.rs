//! Monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings consumed by every block-timeout watch.
///
/// The same `polling_interval_ms` drives pure polling sessions and the
/// polling fallback of subscription sessions.
///
/// Older config files may give `header_setup_timeout_secs` instead of
/// `header_setup_timeout_ms`; the millisecond key wins if both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MonitorConfigFile")]
pub struct MonitorConfig {
    /// Blocks that may elapse after submission before the transaction is
    /// considered stalled.
    pub block_timeout: u64,
    /// Interval between `eth_blockNumber` polls, in milliseconds.
    pub polling_interval_ms: u64,
    /// How long a fresh `newHeads` subscription may stay silent before the
    /// watch falls back to polling, in milliseconds.
    pub header_setup_timeout_ms: u64,
}

/// On-disk shape of [`MonitorConfig`].
#[derive(Deserialize)]
struct MonitorConfigFile {
    #[serde(default = "default_block_timeout")]
    block_timeout: u64,
    #[serde(default = "default_polling_interval_ms")]
    polling_interval_ms: u64,
    #[serde(default)]
    header_setup_timeout_ms: Option<u64>,
    #[serde(default)]
    header_setup_timeout_secs: Option<u64>,
}

impl From<MonitorConfigFile> for MonitorConfig {
    fn from(file: MonitorConfigFile) -> Self {
        let header_setup_timeout_ms = file
            .header_setup_timeout_ms
            .or_else(|| file.header_setup_timeout_secs.map(|s| s.saturating_mul(1_000)))
            .unwrap_or_else(default_header_setup_timeout_ms);
        Self {
            block_timeout: file.block_timeout,
            polling_interval_ms: file.polling_interval_ms,
            header_setup_timeout_ms,
        }
    }
}

fn default_block_timeout() -> u64 { 50 }
fn default_polling_interval_ms() -> u64 { 1_000 }
fn default_header_setup_timeout_ms() -> u64 { 10_000 }

/// Whole milliseconds, rounded up so a non-zero duration never becomes zero.
fn ceil_millis(d: Duration) -> u64 {
    u64::try_from(d.as_micros().div_ceil(1_000)).unwrap_or(u64::MAX)
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            block_timeout: default_block_timeout(),
            polling_interval_ms: default_polling_interval_ms(),
            header_setup_timeout_ms: default_header_setup_timeout_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn with_block_timeout(mut self, blocks: u64) -> Self {
        self.block_timeout = blocks;
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval_ms = ceil_millis(interval);
        self
    }

    pub fn with_header_setup_timeout(mut self, timeout: Duration) -> Self {
        self.header_setup_timeout_ms = ceil_millis(timeout);
        self
    }

    /// Polling period. Never zero: tokio intervals reject a zero period.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms.max(1))
    }

    pub fn header_setup_timeout(&self) -> Duration {
        Duration::from_millis(self.header_setup_timeout_ms)
    }
}
