use super::wire::{
    tx_request_params, Quantity, RpcBlock, RpcReceipt, RpcRequest, RpcResponse, RpcTransaction,
};
use super::ChainClient;
use crate::config::NodeConfig;
use crate::error::{MinorityError, Result};
use crate::types::{Address, PendingTransaction, TxHash, TxReceipt, TxRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Plain HTTP JSON-RPC client.
pub struct JsonRpcClient {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            url: config.rpc_url.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::trace!("-> {} #{}", method, id);
        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(MinorityError::rpc(err.code, err.message));
        }

        Ok(serde_json::from_value(response.result)?)
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn block_number(&self) -> Result<u64> {
        let q: Quantity = self.request("eth_blockNumber", json!([])).await?;
        Ok(q.as_u64())
    }

    async fn transaction_by_hash(&self, hash: TxHash) -> Result<Option<PendingTransaction>> {
        let tx: Option<RpcTransaction> = self
            .request("eth_getTransactionByHash", json!([hash]))
            .await?;
        Ok(tx.map(Into::into))
    }

    async fn pending_transactions(&self) -> Result<Vec<PendingTransaction>> {
        let block: Option<RpcBlock> = self
            .request("eth_getBlockByNumber", json!(["pending", true]))
            .await?;
        Ok(block.map(RpcBlock::into_transactions).unwrap_or_default())
    }

    async fn new_pending_filter(&self) -> Result<String> {
        self.request("eth_newPendingTransactionFilter", json!([]))
            .await
    }

    async fn filter_changes(&self, filter_id: &str) -> Result<Vec<TxHash>> {
        self.request("eth_getFilterChanges", json!([filter_id]))
            .await
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<TxHash> {
        self.request("eth_sendTransaction", json!([tx_request_params(tx)]))
            .await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(receipt.and_then(RpcReceipt::into_receipt))
    }

    async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        let raw: String = self
            .request(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        let digits = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(digits).map_err(|e| MinorityError::decode(format!("eth_call result: {}", e)))
    }
}
