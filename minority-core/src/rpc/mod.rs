pub mod client;
pub mod wire;

pub use client::JsonRpcClient;

use crate::error::{MinorityError, Result};
use crate::types::{Address, PendingTransaction, TxHash, TxReceipt, TxRequest};
use async_trait::async_trait;
use std::time::Duration;

/// What this toolkit needs from a blockchain node. Every call is a point-in-time
/// read or a fire-once write; nothing here is authoritative local state.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    /// `Ok(None)` when the node no longer knows the hash (mined away, dropped, replaced).
    async fn transaction_by_hash(&self, hash: TxHash) -> Result<Option<PendingTransaction>>;

    /// Full snapshot of the node's pending set.
    async fn pending_transactions(&self) -> Result<Vec<PendingTransaction>>;

    /// Install a filter that reports hashes of newly seen pending transactions.
    async fn new_pending_filter(&self) -> Result<String>;

    async fn filter_changes(&self, filter_id: &str) -> Result<Vec<TxHash>>;

    /// Hand a transaction to the node for signing and broadcast.
    async fn send_transaction(&self, tx: &TxRequest) -> Result<TxHash>;

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>>;

    /// Read-only contract call against the latest block.
    async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>>;
}

/// Poll for a receipt until it shows up or `timeout` elapses.
pub async fn wait_for_receipt(
    client: &dyn ChainClient,
    hash: TxHash,
    interval: Duration,
    timeout: Duration,
) -> Result<TxReceipt> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match client.transaction_receipt(hash).await {
            Ok(Some(receipt)) => return Ok(receipt),
            Ok(None) => {}
            Err(e) if e.is_transient() => {
                tracing::debug!("Receipt lookup for {} failed, retrying: {}", hash, e);
            }
            Err(e) => return Err(e),
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(MinorityError::timeout(format!(
                "no receipt for {} after {:?}",
                hash, timeout
            )));
        }
        tokio::time::sleep(interval).await;
    }
}
