use super::SealedBlob;
use crate::error::{MinorityError, Result};
use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;

/// Seal data under a passphrase with ChaCha20Poly1305
pub fn seal(data: &[u8], passphrase: &str) -> Result<SealedBlob> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(passphrase, &salt);
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let cipher = ChaCha20Poly1305::new(&key);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| MinorityError::crypto(format!("Encryption failed: {}", e)))?;

    let checksum = checksum(&ciphertext);

    Ok(SealedBlob {
        version: 1,
        method: "ChaCha20Poly1305".to_string(),
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
        checksum,
        created_at: Utc::now(),
    })
}

/// Open a sealed blob. A wrong passphrase fails authentication.
pub fn open(blob: &SealedBlob, passphrase: &str) -> Result<Vec<u8>> {
    if checksum(&blob.ciphertext) != blob.checksum {
        return Err(MinorityError::crypto("Sealed blob checksum mismatch"));
    }
    if blob.nonce.len() != NONCE_SIZE {
        return Err(MinorityError::crypto(format!(
            "Nonce must be {} bytes, got {}",
            NONCE_SIZE,
            blob.nonce.len()
        )));
    }

    let key = derive_key(passphrase, &blob.salt);
    let cipher = ChaCha20Poly1305::new(&key);
    let nonce = Nonce::from_slice(&blob.nonce);

    cipher
        .decrypt(nonce, blob.ciphertext.as_ref())
        .map_err(|_| MinorityError::crypto("Decryption failed (wrong passphrase?)"))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Key {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    *Key::from_slice(&key)
}

fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
