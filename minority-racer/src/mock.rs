//! In-memory chain for exercising the observer and bidder.

use async_trait::async_trait;
use minority_core::abi::{decode_uint, Token};
use minority_core::{
    Address, ChainClient, MinorityError, PendingTransaction, Result, Selector, TxHash, TxReceipt,
    TxRequest, H256,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
pub struct MockState {
    pub block: u64,
    pub pending: Vec<PendingTransaction>,
    pub known: HashMap<TxHash, PendingTransaction>,
    pub feed: VecDeque<Vec<TxHash>>,
    pub sent: Vec<TxRequest>,
    pub receipts: HashMap<TxHash, TxReceipt>,
    pub total_supply: u128,
    pub owners: HashMap<u128, Address>,
    /// Mints by this address land ahead of ours.
    pub front_runner: Option<Address>,
    pub revert_sends: bool,
    /// Number of upcoming pending-set reads that fail.
    pub failing_polls: u32,
    /// Number of upcoming filter installs that fail.
    pub failing_installs: u32,
    /// Errors returned by the next filter reads, one per read.
    pub filter_read_errors: VecDeque<&'static str>,
    pub filters_installed: u32,
}

#[derive(Default)]
pub struct MockChain {
    pub state: Mutex<MockState>,
}

impl MockChain {
    pub fn contract() -> Address {
        Address([0xc7; 20])
    }

    pub fn mint_tx(n: u8, from: Address) -> PendingTransaction {
        PendingTransaction {
            hash: H256([n; 32]),
            from,
            to: Some(Self::contract()),
            input: Selector::from_signature("mint()").as_bytes().to_vec(),
            fees: Some(minority_core::FeeParams::Eip1559 {
                max_fee_per_gas: 30_000_000_000,
                max_priority_fee_per_gas: 2_000_000_000,
            }),
            nonce: n as u64,
            gas: 100_000,
            value: 0,
        }
    }

    fn mint(state: &mut MockState, to: Address) {
        state.total_supply += 1;
        let id = state.total_supply;
        state.owners.insert(id, to);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().block)
    }

    async fn transaction_by_hash(&self, hash: TxHash) -> Result<Option<PendingTransaction>> {
        Ok(self.state.lock().known.get(&hash).cloned())
    }

    async fn pending_transactions(&self) -> Result<Vec<PendingTransaction>> {
        let mut state = self.state.lock();
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(MinorityError::rpc(-32000, "node busy"));
        }
        Ok(state.pending.clone())
    }

    async fn new_pending_filter(&self) -> Result<String> {
        let mut state = self.state.lock();
        if state.failing_installs > 0 {
            state.failing_installs -= 1;
            return Err(MinorityError::rpc(-32000, "node busy"));
        }
        state.filters_installed += 1;
        Ok(format!("0x{}", state.filters_installed))
    }

    async fn filter_changes(&self, _filter_id: &str) -> Result<Vec<TxHash>> {
        let mut state = self.state.lock();
        if let Some(message) = state.filter_read_errors.pop_front() {
            return Err(MinorityError::rpc(-32000, message));
        }
        Ok(state.feed.pop_front().unwrap_or_default())
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<TxHash> {
        let mut state = self.state.lock();
        state.sent.push(tx.clone());
        state.block += 1;

        let mut hash = [0xee; 32];
        hash[0] = state.sent.len() as u8;
        let hash = H256(hash);

        if let Some(rival) = state.front_runner {
            Self::mint(&mut state, rival);
        }
        let success = !state.revert_sends;
        if success {
            Self::mint(&mut state, tx.from);
        }

        let block_number = state.block;
        state.receipts.insert(
            hash,
            TxReceipt {
                transaction_hash: hash,
                block_number,
                success,
                gas_used: 50_000,
            },
        );
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>> {
        Ok(self.state.lock().receipts.get(&hash).cloned())
    }

    async fn call(&self, _to: Address, data: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.lock();
        if Selector::from_signature("totalSupply()").matches(data) {
            return Ok(Token::Uint(state.total_supply).to_word().to_vec());
        }
        if Selector::from_signature("ownerOf(uint256)").matches(data) {
            let id = decode_uint(&data[4..])?;
            return match state.owners.get(&id) {
                Some(owner) => Ok(Token::Address(*owner).to_word().to_vec()),
                None => Err(MinorityError::rpc(3, "execution reverted")),
            };
        }
        Err(MinorityError::rpc(-32601, "unknown selector"))
    }
}
