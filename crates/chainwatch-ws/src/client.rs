//! WebSocket JSON-RPC client with auto-reconnect and subscription management.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use chainwatch_core::eth;
use chainwatch_core::{
    BlockNumberSource, HeaderFeed, JsonRpcRequest, JsonRpcResponse, ReceiptSource, RequestIds,
    RpcTransport, Subscription, SubscriptionEvent, SubscriptionId, TransactionReceipt,
    TransportError, Unsubscribe,
};

use crate::subscriptions::SubscriptionManager;

type Reply = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;
type Subscribed = (SubscriptionId, mpsc::UnboundedReceiver<SubscriptionEvent>);
type SubscribeReply = oneshot::Sender<Result<Subscribed, TransportError>>;
type PendingMap = Arc<Mutex<HashMap<u64, Pending>>>;

/// Who is waiting on a request id.
enum Pending {
    Call(Reply),
    /// An `eth_subscribe`; routing is set up before the next frame is read.
    Subscribe { kind: String, tx: SubscribeReply },
}

impl Pending {
    fn fail(self, err: TransportError) {
        match self {
            Self::Call(tx) => {
                let _ = tx.send(Err(err));
            }
            Self::Subscribe { tx, .. } => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

/// Configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Reconnect backoff starting duration.
    pub reconnect_initial: Duration,
    /// Maximum reconnect backoff.
    pub reconnect_max: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: Reply },
    Subscribe { req: JsonRpcRequest, kind: String, tx: SubscribeReply },
    /// Write without waiting for the response.
    Notify { req: JsonRpcRequest },
    Close,
}

/// WebSocket JSON-RPC client.
///
/// A background task owns the connection and reconnects with exponential
/// backoff. Subscriptions do not survive a reconnect: each one receives an
/// error event when the connection is lost.
pub struct WsRpcClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionManager,
    ids: Arc<RequestIds>,
}

impl WsRpcClient {
    /// Start the background task for `url`.
    ///
    /// Returns immediately. Requests issued before the first connection is
    /// up wait for that attempt; if it fails they fail with a retryable
    /// `WebSocket` error, as does anything sent while reconnecting.
    pub async fn connect(
        url: impl Into<String>,
        config: WsClientConfig,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::WebSocket(format!("not a websocket url: {url}")));
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let subscriptions = SubscriptionManager::new();

        tokio::spawn(ws_task(url.clone(), cmd_rx, subscriptions.clone(), config));

        Ok(Self {
            url,
            cmd_tx,
            subscriptions,
            ids: Arc::new(RequestIds::new()),
        })
    }

    /// Subscribe to a WebSocket event stream.
    ///
    /// `kind` is the subscription type (e.g. `"newHeads"`, `"logs"`).
    pub async fn subscribe(
        &self,
        kind: &str,
        params: Vec<Value>,
    ) -> Result<Subscription, TransportError> {
        let req = JsonRpcRequest::new(
            self.ids.next(),
            "eth_subscribe",
            std::iter::once(Value::String(kind.to_string()))
                .chain(params)
                .collect(),
        );
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Subscribe { req, kind: kind.to_string(), tx })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;
        let (id, events) = rx
            .await
            .map_err(|_| TransportError::WebSocket("WS response dropped".into()))??;
        tracing::debug!(subscription = %id, kind, url = %self.url, "subscribed");

        let unsubscriber = WsUnsubscriber {
            cmd_tx: self.cmd_tx.clone(),
            subscriptions: self.subscriptions.clone(),
            ids: self.ids.clone(),
        };
        Ok(Subscription::new(id, events, Arc::new(unsubscriber)))
    }

    /// Number of subscriptions currently routed by this client.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for WsRpcClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

/// Removes the routing entry and tells the node, without waiting for it.
struct WsUnsubscriber {
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionManager,
    ids: Arc<RequestIds>,
}

impl Unsubscribe for WsUnsubscriber {
    fn unsubscribe(&self, id: &SubscriptionId) {
        if !self.subscriptions.remove(id) {
            // Already failed by a disconnect; the node forgot it too.
            return;
        }
        let req = JsonRpcRequest::new(
            self.ids.next(),
            "eth_unsubscribe",
            vec![Value::String(id.0.clone())],
        );
        let _ = self.cmd_tx.send(WsCommand::Notify { req });
    }
}

#[async_trait]
impl RpcTransport for WsRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;
        rx.await
            .map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
    }

    fn next_id(&self) -> u64 {
        self.ids.next()
    }

    fn supports_subscriptions(&self) -> bool {
        true
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BlockNumberSource for WsRpcClient {
    async fn block_number(&self) -> Result<u64, TransportError> {
        eth::block_number(self).await
    }
}

#[async_trait]
impl HeaderFeed for WsRpcClient {
    fn supports_subscriptions(&self) -> bool {
        RpcTransport::supports_subscriptions(self)
    }

    async fn subscribe_new_heads(&self) -> Result<Subscription, TransportError> {
        self.subscribe("newHeads", vec![]).await
    }
}

#[async_trait]
impl ReceiptSource for WsRpcClient {
    async fn transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        eth::transaction_receipt(self, transaction_hash).await
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(
    url: String,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    subscriptions: SubscriptionManager,
    config: WsClientConfig,
) {
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let mut backoff = config.reconnect_initial;

    loop {
        tracing::info!(url = %url, "connecting via WebSocket");

        let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "WS connect failed, retrying in {backoff:?}");
                if !wait_offline(backoff, &mut cmd_rx).await {
                    return;
                }
                backoff = (backoff * 2).min(config.reconnect_max);
                continue;
            }
        };
        backoff = config.reconnect_initial;
        let (mut sink, mut stream) = ws_stream.split();

        // Main dispatch loop
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        None | Some(WsCommand::Close) => {
                            let _ = sink.send(Message::Close(None)).await;
                            subscriptions.fail_all("client closed");
                            fail_pending(&pending, "client closed");
                            return;
                        }
                        Some(WsCommand::Send { req, tx }) => {
                            let Some(msg) = register_pending(&pending, &req, Pending::Call(tx)) else {
                                continue;
                            };
                            if sink.send(Message::Text(msg)).await.is_err() {
                                break;
                            }
                        }
                        Some(WsCommand::Subscribe { req, kind, tx }) => {
                            let waiter = Pending::Subscribe { kind, tx };
                            let Some(msg) = register_pending(&pending, &req, waiter) else {
                                continue;
                            };
                            if sink.send(Message::Text(msg)).await.is_err() {
                                break;
                            }
                        }
                        Some(WsCommand::Notify { req }) => {
                            if let Ok(msg) = serde_json::to_string(&req) {
                                if sink.send(Message::Text(msg)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
                msg = stream.next() => {
                    match msg {
                        None => break,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WS receive error");
                            break;
                        }
                        Some(Ok(Message::Text(text))) => {
                            handle_message(text.as_str(), &pending, &subscriptions);
                        }
                        Some(Ok(Message::Close(_))) => break,
                        _ => {}
                    }
                }
            }
        }

        let failed = subscriptions.fail_all("WebSocket connection lost");
        fail_pending(&pending, "WebSocket connection lost");
        tracing::warn!(url = %url, subscriptions = failed, "WS disconnected, reconnecting in {backoff:?}");
        if !wait_offline(backoff, &mut cmd_rx).await {
            return;
        }
        backoff = (backoff * 2).min(config.reconnect_max);
    }
}

/// Sleep for `backoff`, failing requests that arrive in the meantime.
/// Returns `false` if the client was closed.
async fn wait_offline(backoff: Duration, cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>) -> bool {
    let sleep = time::sleep(backoff);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = cmd_rx.recv() => match cmd {
                None | Some(WsCommand::Close) => return false,
                Some(WsCommand::Send { tx, .. }) => {
                    Pending::Call(tx).fail(TransportError::WebSocket("not connected".into()));
                }
                Some(WsCommand::Subscribe { kind, tx, .. }) => {
                    Pending::Subscribe { kind, tx }
                        .fail(TransportError::WebSocket("not connected".into()));
                }
                Some(WsCommand::Notify { .. }) => {}
            },
        }
    }
}

fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<u64, Pending>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record `waiter` under the request id and return the frame to write.
/// `None` if the request cannot be sent; the waiter has been failed.
fn register_pending(pending: &PendingMap, req: &JsonRpcRequest, waiter: Pending) -> Option<String> {
    let Some(id) = req.id.as_number() else {
        waiter.fail(TransportError::Other("request id must be numeric".into()));
        return None;
    };
    match serde_json::to_string(req) {
        Ok(msg) => {
            lock(pending).insert(id, waiter);
            Some(msg)
        }
        Err(e) => {
            waiter.fail(TransportError::Deserialization(e));
            None
        }
    }
}

fn fail_pending(pending: &PendingMap, reason: &str) {
    for (_, waiter) in lock(pending).drain() {
        waiter.fail(TransportError::WebSocket(reason.to_string()));
    }
}

fn complete_subscribe(
    resp: JsonRpcResponse,
    kind: String,
    tx: SubscribeReply,
    subscriptions: &SubscriptionManager,
) {
    let id = match resp.into_result() {
        Ok(Value::String(id)) => SubscriptionId(id),
        Ok(other) => {
            let _ = tx.send(Err(TransportError::Other(format!(
                "unexpected eth_subscribe result: {other}"
            ))));
            return;
        }
        Err(e) => {
            let _ = tx.send(Err(TransportError::Rpc(e)));
            return;
        }
    };
    let events = subscriptions.register(id.clone(), kind);
    if tx.send(Ok((id.clone(), events))).is_err() {
        // Caller stopped waiting; nobody will read this feed.
        subscriptions.remove(&id);
    }
}

fn handle_message(text: &str, pending: &PendingMap, subscriptions: &SubscriptionManager) {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        tracing::debug!("failed to parse WS message as JSON");
        return;
    };

    if val.get("method").and_then(|m| m.as_str()) == Some("eth_subscription") {
        let params = &val["params"];
        if let Some(id) = params["subscription"].as_str() {
            subscriptions.dispatch(&SubscriptionId(id.to_string()), params["result"].clone());
        }
        return;
    }

    match serde_json::from_value::<JsonRpcResponse>(val) {
        Ok(resp) => {
            let Some(id) = resp.id.as_number() else {
                return;
            };
            let waiter = lock(pending).remove(&id);
            match waiter {
                Some(Pending::Call(tx)) => {
                    let _ = tx.send(Ok(resp));
                }
                Some(Pending::Subscribe { kind, tx }) => {
                    complete_subscribe(resp, kind, tx, subscriptions);
                }
                None => {}
            }
        }
        Err(e) => tracing::debug!(error = %e, "unrecognised WS message"),
    }
}
