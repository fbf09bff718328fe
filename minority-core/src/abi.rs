//! Just enough of the Solidity ABI to talk to the contracts this toolkit cares
//! about: static `uint256`/`address` arguments and return values.

use crate::error::{MinorityError, Result};
use crate::types::{Address, Selector, H256};
use sha3::{Digest, Keccak256};

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// A single static ABI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Uint(u128),
    Address(Address),
    Word(H256),
}

impl Token {
    pub fn to_word(&self) -> [u8; WORD] {
        let mut word = [0u8; WORD];
        match self {
            Token::Uint(value) => word[WORD - 16..].copy_from_slice(&value.to_be_bytes()),
            Token::Address(addr) => word[WORD - Address::LEN..].copy_from_slice(addr.as_bytes()),
            Token::Word(h) => word.copy_from_slice(h.as_bytes()),
        }
        word
    }
}

/// `selector ++ abi.encode(args...)` for static argument lists.
pub fn encode_call(selector: Selector, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(Selector::LEN + args.len() * WORD);
    data.extend_from_slice(selector.as_bytes());
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

fn first_word(data: &[u8]) -> Result<&[u8]> {
    data.get(..WORD).ok_or_else(|| {
        MinorityError::decode(format!(
            "expected at least {} bytes of return data, got {}",
            WORD,
            data.len()
        ))
    })
}

/// Decode a `uint256` return value, rejecting values that do not fit in `u128`.
pub fn decode_uint(data: &[u8]) -> Result<u128> {
    let word = first_word(data)?;
    if word[..WORD - 16].iter().any(|b| *b != 0) {
        return Err(MinorityError::decode("uint256 value exceeds u128"));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[WORD - 16..]);
    Ok(u128::from_be_bytes(low))
}

pub fn decode_address(data: &[u8]) -> Result<Address> {
    let word = first_word(data)?;
    if word[..WORD - Address::LEN].iter().any(|b| *b != 0) {
        return Err(MinorityError::decode("address word has dirty high bytes"));
    }
    Address::from_slice(&word[WORD - Address::LEN..])
}
