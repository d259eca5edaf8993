//! Chain data types decoded from node responses.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TransportError;

/// Parse a hex quantity (`"0x1b4"`) into a `u64`.
///
/// The `0x` prefix is optional; an empty digit string is rejected.
pub fn parse_hex_u64(s: &str) -> Result<u64, TransportError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Err(TransportError::InvalidQuantity(s.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| TransportError::InvalidQuantity(s.to_string()))
}

/// Serde helpers for quantities. Nodes send hex strings; some also send
/// plain JSON integers, which are accepted as-is.
pub mod quantity {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Number(u64),
        Hex(String),
    }

    impl Quantity {
        fn into_u64(self) -> Result<u64, TransportError> {
            match self {
                Self::Number(n) => Ok(n),
                Self::Hex(s) => parse_hex_u64(&s),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Quantity::deserialize(d)?
            .into_u64()
            .map_err(serde::de::Error::custom)
    }

    pub fn opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Option::<Quantity>::deserialize(d)?
            .map(Quantity::into_u64)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

/// A block header as pushed by a `newHeads` subscription.
///
/// Every field is optional: nodes differ in what they send, and a header
/// without a `number` is still a sign of life from the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    #[serde(default, deserialize_with = "quantity::opt")]
    pub number: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub timestamp: Option<u64>,
}

/// The subset of `eth_getTransactionReceipt` the monitor cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub status: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub gas_used: Option<u64>,
}

impl TransactionReceipt {
    /// `true` for post-Byzantium receipts with `status == 1`.
    pub fn is_success(&self) -> bool {
        self.status == Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_hex() {
        assert_eq!(parse_hex_u64("0x64").unwrap(), 100);
        assert_eq!(parse_hex_u64("ff").unwrap(), 255);
        assert!(parse_hex_u64("0x").is_err());
        assert!(parse_hex_u64("0xnope").is_err());
    }

    #[test]
    fn header_from_new_heads_payload() {
        let header: BlockHeader = serde_json::from_value(json!({
            "number": "0x1b4",
            "hash": "0xdc0818cf78f21a8e70579cb46a43643f78291264dda342ae31049421c82d21ae",
            "parentHash": "0x6a1ea9db1a0c41d7e1a9ee0c3bb2c4bcaa1d5cbd1a5e55a2e09c6ea7c1bbc0fb",
            "timestamp": "0x55ba467c",
            "miner": "0x0000000000000000000000000000000000000000"
        }))
        .unwrap();
        assert_eq!(header.number, Some(436));
        assert_eq!(header.timestamp, Some(0x55ba467c));
        assert!(header.parent_hash.is_some());
    }

    #[test]
    fn integer_quantities_are_accepted() {
        let header: BlockHeader =
            serde_json::from_value(json!({ "number": 105, "timestamp": 1_438_271_100u64 })).unwrap();
        assert_eq!(header.number, Some(105));
        assert_eq!(header.timestamp, Some(1_438_271_100));

        let null: BlockHeader = serde_json::from_value(json!({ "number": null })).unwrap();
        assert_eq!(null.number, None);
        assert!(serde_json::from_value::<BlockHeader>(json!({ "number": -1 })).is_err());
        assert!(serde_json::from_value::<BlockHeader>(json!({ "number": "0xzz" })).is_err());
    }

    #[test]
    fn header_without_number() {
        let header: BlockHeader = serde_json::from_value(json!({ "hash": "0xabc" })).unwrap();
        assert_eq!(header.number, None);
    }

    #[test]
    fn receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0xfeed",
            "blockHash": "0xbeef",
            "blockNumber": "0x10",
            "status": "0x1",
            "gasUsed": "0x5208"
        }))
        .unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.block_number, Some(16));
        assert_eq!(receipt.gas_used, Some(21_000));
    }
}
