use crate::error::{MinorityError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Amounts are always integers in the smallest unit (wei).
pub type Wei = u128;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    MinorityError::decode(format!(
                        "{} expects {} bytes, got {}",
                        stringify!($name),
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Self(arr))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = MinorityError;

            fn from_str(s: &str) -> Result<Self> {
                let stripped = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let bytes = hex::decode(stripped).map_err(|e| {
                    MinorityError::decode(format!("invalid {} '{}': {}", stringify!($name), s, e))
                })?;
                Self::from_slice(&bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// 20-byte account identity. Parsing is case-insensitive, display is lowercase.
    Address,
    20
);

fixed_bytes!(
    /// 32-byte word: transaction hashes, commit hashes and secrets.
    H256,
    32
);

fixed_bytes!(
    /// First four bytes of a call's data, identifying the invoked function.
    Selector,
    4
);

pub type TxHash = H256;

impl Address {
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}..{}", &full[..8], &full[full.len() - 4..])
    }
}

impl Selector {
    /// Selector of a canonical function signature such as `mint()`.
    pub fn from_signature(signature: &str) -> Self {
        let hash = crate::abi::keccak256(signature.as_bytes());
        Self([hash[0], hash[1], hash[2], hash[3]])
    }

    /// Whether `input` is a call to this selector.
    pub fn matches(&self, input: &[u8]) -> bool {
        input.len() >= Self::LEN && input[..Self::LEN] == self.0
    }
}

/// Fee fields of a transaction, resolved once from whatever the node reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeParams {
    Legacy {
        gas_price: Wei,
    },
    Eip1559 {
        max_fee_per_gas: Wei,
        max_priority_fee_per_gas: Wei,
    },
}

impl FeeParams {
    /// Resolve the node's optional fee fields. Priority-fee fields win when both are present.
    pub fn resolve(
        gas_price: Option<Wei>,
        max_fee_per_gas: Option<Wei>,
        max_priority_fee_per_gas: Option<Wei>,
    ) -> Option<Self> {
        match (max_fee_per_gas, max_priority_fee_per_gas, gas_price) {
            (Some(max_fee_per_gas), Some(max_priority_fee_per_gas), _) => Some(Self::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            }),
            (_, _, Some(gas_price)) => Some(Self::Legacy { gas_price }),
            _ => None,
        }
    }

    /// The tip a block producer sees when ordering transactions.
    pub fn priority(&self) -> Wei {
        match self {
            Self::Legacy { gas_price } => *gas_price,
            Self::Eip1559 {
                max_priority_fee_per_gas,
                ..
            } => *max_priority_fee_per_gas,
        }
    }
}

/// Snapshot of a transaction seen in a node's mempool. Not owned by us; it may be
/// mined, dropped or replaced at any moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    pub input: Vec<u8>,
    pub fees: Option<FeeParams>,
    pub nonce: u64,
    pub gas: u64,
    pub value: Wei,
}

/// Transaction we ask the node to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub input: Vec<u8>,
    pub value: Wei,
    pub gas_limit: u64,
    pub fees: FeeParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub gas_used: u64,
}
