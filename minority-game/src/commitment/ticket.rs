use super::{compute_commit_hash, generate_secret, CommitHash};
use crate::Result;
use minority_core::vault::{self, SealedBlob};
use minority_core::{Address, Wei, H256};
use serde::{Deserialize, Serialize};

/// Everything a participant must keep private between commit and reveal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealTicket {
    pub round_id: u64,
    pub participant: Address,
    pub choice: usize,
    pub secret: H256,
    pub amount: Wei,
    pub commit_hash: CommitHash,
}

impl RevealTicket {
    /// Draw a secret and bind it to the choice.
    pub fn new(round_id: u64, participant: Address, choice: usize, amount: Wei) -> Self {
        let secret = generate_secret();
        let commit_hash = compute_commit_hash(round_id, choice, &secret, &participant);
        Self {
            round_id,
            participant,
            choice,
            secret,
            amount,
            commit_hash,
        }
    }

    pub fn seal(&self, passphrase: &str) -> Result<SealedBlob> {
        let plain = serde_json::to_vec(self)?;
        Ok(vault::seal(&plain, passphrase)?)
    }

    pub fn unseal(blob: &SealedBlob, passphrase: &str) -> Result<Self> {
        let plain = vault::open(blob, passphrase)?;
        Ok(serde_json::from_slice(&plain)?)
    }
}

impl std::fmt::Debug for RevealTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealTicket")
            .field("round_id", &self.round_id)
            .field("participant", &self.participant)
            .field("amount", &self.amount)
            .field("commit_hash", &self.commit_hash)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::verify_reveal;

    #[test]
    fn test_ticket_hash_matches_contents() {
        let who: Address = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap();
        let ticket = RevealTicket::new(3, who, 1, 10);
        verify_reveal(&ticket.commit_hash, 3, 1, &ticket.secret, &who).unwrap();
    }

    #[test]
    fn test_seal_unseal_and_debug_hides_secret() {
        let who: Address = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap();
        let ticket = RevealTicket::new(3, who, 1, 10);

        let blob = ticket.seal("pw").unwrap();
        assert_eq!(RevealTicket::unseal(&blob, "pw").unwrap(), ticket);
        assert!(RevealTicket::unseal(&blob, "nope").is_err());

        let debug = format!("{:?}", ticket);
        assert!(!debug.contains(&hex::encode(ticket.secret.0)));
        assert!(!debug.contains("choice"));
    }
}
