//! chainwatch-http — HTTP JSON-RPC transport for ChainWatch.
//!
//! HTTP cannot push notifications, so block-timeout watches over this
//! transport always poll `eth_blockNumber`.

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
