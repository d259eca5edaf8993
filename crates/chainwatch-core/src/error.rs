//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to a node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A hex quantity in a response was malformed.
    #[error("Invalid hex quantity: {0:?}")]
    InvalidQuantity(String),

    /// The transport cannot perform the requested operation
    /// (e.g. `eth_subscribe` over plain HTTP).
    #[error("Unsupported by transport: {0}")]
    Unsupported(&'static str),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. } => true,
            // Server-side trouble and throttling pass; client errors will not.
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this is a node-side error (not retryable).
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(TransportError::Http("refused".into()).is_retryable());
        assert!(TransportError::WebSocket("closed".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 10 }.is_retryable());
        assert!(!TransportError::Unsupported("eth_subscribe").is_retryable());
        assert!(!TransportError::InvalidQuantity("0xzz".into()).is_retryable());
    }

    #[test]
    fn only_server_statuses_are_retryable() {
        let status = |status| TransportError::HttpStatus { status, body: String::new() };
        assert!(status(502).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert_eq!(status(404).to_string(), "HTTP 404: ");
    }

    #[test]
    fn rpc_error_is_execution_error() {
        let err = TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "header not found".into(),
            data: None,
        });
        assert!(err.is_execution_error());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "RPC error -32000: header not found");
    }
}
