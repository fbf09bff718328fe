//! Binding commitments over (round, choice, secret, participant).
//!
//! The packed layout matches Solidity's
//! `keccak256(abi.encodePacked(uint256 roundId, uint256 choice, bytes32 secret, address player))`
//! so a hash computed here is accepted by the on-chain contract and vice versa.

pub mod ticket;

pub use ticket::RevealTicket;

use crate::{GameError, Result};
use minority_core::abi::{keccak256, Token};
use minority_core::{Address, H256};
use rand::RngCore;

pub type CommitHash = H256;

const PACKED_LEN: usize = 32 + 32 + 32 + Address::LEN;

fn packed(round_id: u64, choice: usize, secret: &H256, participant: &Address) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PACKED_LEN);
    buf.extend_from_slice(&Token::Uint(round_id as u128).to_word());
    buf.extend_from_slice(&Token::Uint(choice as u128).to_word());
    buf.extend_from_slice(secret.as_bytes());
    buf.extend_from_slice(participant.as_bytes());
    buf
}

pub fn compute_commit_hash(
    round_id: u64,
    choice: usize,
    secret: &H256,
    participant: &Address,
) -> CommitHash {
    H256(keccak256(&packed(round_id, choice, secret, participant)))
}

/// Recompute the hash from the revealed values and compare.
pub fn verify_reveal(
    hash: &CommitHash,
    round_id: u64,
    choice: usize,
    secret: &H256,
    participant: &Address,
) -> Result<()> {
    if compute_commit_hash(round_id, choice, secret, participant) == *hash {
        Ok(())
    } else {
        Err(GameError::HashMismatch)
    }
}

/// Fresh 32-byte secret from the OS RNG
pub fn generate_secret() -> H256 {
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    H256(secret)
}
