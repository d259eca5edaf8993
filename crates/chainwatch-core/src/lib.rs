//! chainwatch-core — foundation traits and types for ChainWatch.
//!
//! # Overview
//!
//! ChainWatch tracks submitted transactions against a JSON-RPC node and
//! detects the ones that stall. The core crate defines:
//!
//! - [`RpcTransport`] — the request/response trait every transport implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types
//! - [`TransportError`] — structured error type
//! - [`BlockNumberSource`], [`HeaderFeed`], [`ReceiptSource`] — the narrow
//!   capabilities the monitor consumes
//! - [`Subscription`] — typed push-notification channel
//! - [`eth`] module — `eth_*` call helpers

pub mod error;
pub mod eth;
pub mod request;
pub mod source;
pub mod subscription;
pub mod transport;
pub mod types;

pub use error::TransportError;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestIds, RpcId};
pub use source::{BlockNumberSource, BlockProvider, HeaderFeed, ReceiptSource};
pub use subscription::{Subscription, SubscriptionEvent, SubscriptionId, Unsubscribe};
pub use transport::RpcTransport;
pub use types::{BlockHeader, TransactionReceipt};
