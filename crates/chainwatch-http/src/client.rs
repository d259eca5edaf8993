//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Features:
//! - Retry with exponential backoff and jitter for transient errors
//! - True HTTP batching
//! - Request/response only: `newHeads` watches over this transport poll

use std::time::Duration;

use async_trait::async_trait;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use chainwatch_core::eth;
use chainwatch_core::{
    BlockNumberSource, HeaderFeed, JsonRpcRequest, JsonRpcResponse, ReceiptSource, RequestIds,
    RpcTransport, Subscription, TransactionReceipt, TransportError,
};

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on every further one.
    pub initial_backoff: Duration,
    /// Cap on any single retry delay.
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpClientConfig {
    /// Retry delays: `initial_backoff * 2^n`, capped and jittered.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        let half_initial_ms = (self.initial_backoff.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(half_initial_ms)
            .max_delay(self.max_backoff)
            .map(jitter)
            .take(self.max_retries)
    }
}

/// HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    config: HttpClientConfig,
    ids: RequestIds,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
            config,
            ids: RequestIds::new(),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.config.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus { status, body });
        }

        resp.json::<R>().await.map_err(|e| self.map_reqwest(e))
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let req = &req;
        let mut attempt = 0u32;
        let result = RetryIf::spawn(
            self.config.backoff(),
            move || self.post::<_, JsonRpcResponse>(req),
            |e: &TransportError| {
                attempt += 1;
                let retry = e.is_retryable();
                if retry {
                    tracing::warn!(
                        attempt,
                        error = %e,
                        url = %self.url,
                        method = %req.method,
                        "retrying request"
                    );
                }
                retry
            },
        )
        .await;

        if let Err(e) = &result {
            if e.is_retryable() {
                tracing::error!(error = %e, url = %self.url, method = %req.method, "max retries exceeded");
            }
        }
        result
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        self.post(&reqs).await
    }

    fn next_id(&self) -> u64 {
        self.ids.next()
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BlockNumberSource for HttpRpcClient {
    async fn block_number(&self) -> Result<u64, TransportError> {
        eth::block_number(self).await
    }
}

#[async_trait]
impl HeaderFeed for HttpRpcClient {
    fn supports_subscriptions(&self) -> bool {
        RpcTransport::supports_subscriptions(self)
    }

    async fn subscribe_new_heads(&self) -> Result<Subscription, TransportError> {
        Err(TransportError::Unsupported("eth_subscribe over HTTP"))
    }
}

#[async_trait]
impl ReceiptSource for HttpRpcClient {
    async fn transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        eth::transaction_receipt(self, transaction_hash).await
    }
}
