//! Passphrase-sealed storage for reveal material. A commitment is only binding
//! if its secret stays local until the reveal phase, so it never leaves the
//! machine in clear text.

pub mod encryption;

pub use encryption::{open, seal};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBlob {
    pub version: u32,
    pub method: String,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}
