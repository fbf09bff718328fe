//! minority-core - primitives shared by the minority game and the mempool racer
//!
//! Chain-facing types, a minimal ABI codec, the `ChainClient` capability with a
//! JSON-RPC implementation, SQLite storage and the sealed secret vault.

pub mod abi;
pub mod config;
pub mod error;
pub mod rpc;
pub mod storage;
pub mod types;
pub mod units;
pub mod vault;

pub use config::NodeConfig;
pub use error::{MinorityError, Result};
pub use rpc::{ChainClient, JsonRpcClient};
pub use storage::{SecretStore, Storage};
pub use types::{
    Address, FeeParams, PendingTransaction, Selector, TxHash, TxReceipt, TxRequest, Wei, H256,
};
