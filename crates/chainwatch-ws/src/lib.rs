//! chainwatch-ws — WebSocket JSON-RPC transport with auto-reconnect.
//!
//! # Features
//! - Auto-reconnect on disconnect (exponential backoff)
//! - `newHeads` and other `eth_subscribe` streams as [`chainwatch_core::Subscription`]s
//! - Subscriptions are failed, not replayed, when the connection drops
//! - Request multiplexing over a single connection

pub mod client;
pub mod subscriptions;

pub use client::{WsClientConfig, WsRpcClient};
pub use subscriptions::SubscriptionManager;
