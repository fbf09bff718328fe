//! JSON shapes of the Ethereum JSON-RPC responses we read.

use crate::error::{MinorityError, Result};
use crate::types::{
    Address, FeeParams, PendingTransaction, TxHash, TxReceipt, TxRequest, Wei,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Hex-encoded JSON-RPC quantity (`"0x1a"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quantity(pub u128);

impl Quantity {
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| MinorityError::decode(format!("quantity '{}' lacks 0x prefix", s)))?;
        if digits.is_empty() {
            return Ok(Self(0));
        }
        u128::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| MinorityError::decode(format!("invalid quantity '{}': {}", s, e)))
    }

    pub fn as_u64(&self) -> u64 {
        u64::try_from(self.0).unwrap_or(u64::MAX)
    }
}

pub fn to_quantity(value: u128) -> String {
    format!("{:#x}", value)
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Quantity::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits)
            .map(HexBytes)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(alias = "data", default)]
    pub input: HexBytes,
    pub nonce: Quantity,
    #[serde(default)]
    pub gas: Quantity,
    #[serde(default)]
    pub value: Quantity,
    pub gas_price: Option<Quantity>,
    pub max_fee_per_gas: Option<Quantity>,
    pub max_priority_fee_per_gas: Option<Quantity>,
}

impl From<RpcTransaction> for PendingTransaction {
    fn from(tx: RpcTransaction) -> Self {
        let fees = FeeParams::resolve(
            tx.gas_price.map(|q| q.0),
            tx.max_fee_per_gas.map(|q| q.0),
            tx.max_priority_fee_per_gas.map(|q| q.0),
        );
        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            input: tx.input.0,
            fees,
            nonce: tx.nonce.as_u64(),
            gas: tx.gas.as_u64(),
            value: tx.value.0,
        }
    }
}

/// Block with full transaction objects. Some nodes return bare hashes for
/// `pending`; those entries are skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl RpcBlock {
    pub fn into_transactions(self) -> Vec<PendingTransaction> {
        self.transactions
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<RpcTransaction>(value) {
                Ok(tx) => Some(tx.into()),
                Err(e) => {
                    tracing::debug!("Skipping undecodable pending entry: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<Quantity>,
    pub status: Option<Quantity>,
    #[serde(default)]
    pub gas_used: Quantity,
}

impl RpcReceipt {
    /// `None` while the receipt still lacks a block number.
    pub fn into_receipt(self) -> Option<TxReceipt> {
        let block_number = self.block_number?.as_u64();
        Some(TxReceipt {
            transaction_hash: self.transaction_hash,
            block_number,
            // pre-Byzantium receipts have no status field
            success: self.status.map_or(true, |s| s.0 == 1),
            gas_used: self.gas_used.as_u64(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    pub error: Option<RpcErrorObject>,
}

pub fn tx_request_params(tx: &TxRequest) -> Value {
    let mut obj = json!({
        "from": tx.from,
        "to": tx.to,
        "data": format!("0x{}", hex::encode(&tx.input)),
        "value": to_quantity(tx.value),
        "gas": to_quantity(tx.gas_limit as Wei),
    });
    if let Some(map) = obj.as_object_mut() {
        match tx.fees {
            FeeParams::Legacy { gas_price } => {
                map.insert("gasPrice".into(), Value::String(to_quantity(gas_price)));
            }
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                map.insert(
                    "maxFeePerGas".into(),
                    Value::String(to_quantity(max_fee_per_gas)),
                );
                map.insert(
                    "maxPriorityFeePerGas".into(),
                    Value::String(to_quantity(max_priority_fee_per_gas)),
                );
            }
        }
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_parse() {
        assert_eq!(Quantity::parse("0x0").unwrap().0, 0);
        assert_eq!(Quantity::parse("0x").unwrap().0, 0);
        assert_eq!(Quantity::parse("0x3b9aca00").unwrap().0, 1_000_000_000);
        assert!(Quantity::parse("12").is_err());
        assert!(Quantity::parse("0xzz").is_err());
    }

    #[test]
    fn test_eip1559_transaction_decodes_to_priority_fee_variant() {
        let raw = json!({
            "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "from": "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "to": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "input": "0x1249c58b",
            "nonce": "0x3",
            "gas": "0x5208",
            "value": "0x0",
            "gasPrice": "0x77359400",
            "maxFeePerGas": "0x77359400",
            "maxPriorityFeePerGas": "0x3b9aca00"
        });
        let tx: PendingTransaction = serde_json::from_value::<RpcTransaction>(raw)
            .unwrap()
            .into();
        assert_eq!(tx.nonce, 3);
        assert_eq!(tx.input, vec![0x12, 0x49, 0xc5, 0x8b]);
        assert_eq!(
            tx.fees,
            Some(FeeParams::Eip1559 {
                max_fee_per_gas: 2_000_000_000,
                max_priority_fee_per_gas: 1_000_000_000,
            })
        );
    }

    #[test]
    fn test_legacy_transaction_and_contract_creation() {
        let raw = json!({
            "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "from": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "to": null,
            "data": "0x",
            "nonce": "0x0",
            "gasPrice": "0x1"
        });
        let tx: PendingTransaction = serde_json::from_value::<RpcTransaction>(raw)
            .unwrap()
            .into();
        assert!(tx.to.is_none());
        assert!(tx.input.is_empty());
        assert_eq!(tx.fees, Some(FeeParams::Legacy { gas_price: 1 }));
    }

    #[test]
    fn test_pending_block_skips_hash_only_entries() {
        let raw = json!({
            "transactions": [
                "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
                {
                    "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944c",
                    "from": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
                    "to": null,
                    "input": "0x",
                    "nonce": "0x0",
                    "gasPrice": "0x1"
                }
            ]
        });
        let block: RpcBlock = serde_json::from_value(raw).unwrap();
        assert_eq!(block.into_transactions().len(), 1);
    }

    #[test]
    fn test_receipt_status() {
        let raw = json!({
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x10",
            "status": "0x0",
            "gasUsed": "0x5208"
        });
        let receipt = serde_json::from_value::<RpcReceipt>(raw)
            .unwrap()
            .into_receipt()
            .unwrap();
        assert_eq!(receipt.block_number, 16);
        assert!(!receipt.success);
    }

    #[test]
    fn test_send_params_carry_fee_variant() {
        let tx = TxRequest {
            from: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap(),
            to: "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap(),
            input: vec![0x12, 0x49, 0xc5, 0x8b],
            value: 0,
            gas_limit: 300_000,
            fees: FeeParams::Legacy { gas_price: 16 },
        };
        let params = tx_request_params(&tx);
        assert_eq!(params["gasPrice"], "0x10");
        assert_eq!(params["data"], "0x1249c58b");
        assert_eq!(params["gas"], "0x493e0");
        assert!(params.get("maxFeePerGas").is_none());
    }
}
