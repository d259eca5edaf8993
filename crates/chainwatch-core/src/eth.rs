//! `eth_*` call helpers shared by every transport.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;
use crate::types::{parse_hex_u64, TransactionReceipt};

/// Call `method` and deserialize the result.
pub async fn call<R, T>(transport: &T, method: &str, params: Vec<Value>) -> Result<R, TransportError>
where
    R: DeserializeOwned,
    T: RpcTransport + ?Sized,
{
    let req = JsonRpcRequest::new(transport.next_id(), method, params);
    let resp = transport.send(req).await?;
    let result = resp.into_result().map_err(TransportError::Rpc)?;
    serde_json::from_value(result).map_err(TransportError::Deserialization)
}

/// `eth_blockNumber` decoded to a `u64`.
pub async fn block_number<T: RpcTransport + ?Sized>(transport: &T) -> Result<u64, TransportError> {
    let hex: String = call(transport, "eth_blockNumber", vec![]).await?;
    parse_hex_u64(&hex)
}

/// `eth_getTransactionReceipt`; `None` while the node returns `null`.
pub async fn transaction_receipt<T: RpcTransport + ?Sized>(
    transport: &T,
    transaction_hash: &str,
) -> Result<Option<TransactionReceipt>, TransportError> {
    call(
        transport,
        "eth_getTransactionReceipt",
        vec![Value::String(transaction_hash.to_string())],
    )
    .await
}
