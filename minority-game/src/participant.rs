use crate::commitment::RevealTicket;
use crate::escrow::ClaimOutcome;
use crate::game::MinorityGame;
use crate::round::RoundId;
use crate::{GameError, Result};
use minority_core::{Address, SecretStore, Wei};

/// One identity playing rounds. The reveal ticket is sealed into the local
/// vault before the commitment is sent, so the secret outlives the process.
#[derive(Debug, Clone, Copy)]
pub struct Participant {
    address: Address,
}

impl Participant {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Pick `choice`, stake `amount` and commit to it.
    pub async fn commit(
        &self,
        game: &MinorityGame,
        round_id: RoundId,
        choice: usize,
        amount: Wei,
        passphrase: &str,
    ) -> Result<RevealTicket> {
        let round = game.get_round_info(round_id).await?;
        if choice >= round.options.len() {
            return Err(GameError::InvalidChoice {
                choice,
                options: round.options.len(),
            });
        }

        if game.get_commitment(round_id, &self.address).await?.is_some() {
            return Err(GameError::AlreadyCommitted);
        }

        // the vault holds one ticket per round; a held ticket belongs to a
        // commit that landed or is still in flight
        let ticket = RevealTicket::new(round_id, self.address, choice, amount);
        let secrets = SecretStore::new(game.storage());
        if !secrets
            .insert(round_id, &self.address, &ticket.seal(passphrase)?)
            .await?
        {
            return Err(GameError::AlreadyCommitted);
        }

        if let Err(e) = game
            .commit(round_id, self.address, ticket.commit_hash, amount)
            .await
        {
            // nothing was locked, so the ticket this call stored is worthless
            secrets.delete(round_id, &self.address).await?;
            return Err(e);
        }

        Ok(ticket)
    }

    pub async fn load_ticket(
        &self,
        game: &MinorityGame,
        round_id: RoundId,
        passphrase: &str,
    ) -> Result<RevealTicket> {
        let blob = SecretStore::new(game.storage())
            .load(round_id, &self.address)
            .await?
            .ok_or(GameError::MissingTicket(round_id))?;
        RevealTicket::unseal(&blob, passphrase)
    }

    /// Reveal using the sealed ticket. Returns the revealed choice.
    pub async fn reveal(
        &self,
        game: &MinorityGame,
        round_id: RoundId,
        passphrase: &str,
    ) -> Result<usize> {
        let ticket = self.load_ticket(game, round_id, passphrase).await?;
        game.reveal(round_id, self.address, ticket.choice, ticket.secret)
            .await?;
        Ok(ticket.choice)
    }

    /// Claim and drop the ticket once the round is settled for us.
    pub async fn claim(&self, game: &MinorityGame, round_id: RoundId) -> Result<ClaimOutcome> {
        let outcome = game.claim_reward(round_id, self.address).await?;
        SecretStore::new(game.storage())
            .delete(round_id, &self.address)
            .await?;
        Ok(outcome)
    }

    /// Rounds this participant still holds a ticket for.
    pub async fn pending_rounds(&self, game: &MinorityGame) -> Result<Vec<RoundId>> {
        Ok(SecretStore::new(game.storage())
            .rounds_for(&self.address)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GameConfig;
    use minority_core::units::ETHER;
    use minority_core::Storage;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_commit_reveal_claim_through_vault() {
        let clock = Arc::new(ManualClock::new(0));
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let game = MinorityGame::with_storage(storage, GameConfig::default(), clock.clone())
            .await
            .unwrap();
        let id = game
            .create_round(
                Address([0xc0; 20]),
                "q",
                vec!["a".into(), "b".into()],
                Duration::from_secs(10),
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        let alice = Participant::new(Address([1; 20]));
        let bob = Participant::new(Address([2; 20]));

        assert!(matches!(
            alice.commit(&game, id, 5, ETHER, "pw").await,
            Err(GameError::InvalidChoice { .. })
        ));
        alice.commit(&game, id, 0, ETHER, "pw").await.unwrap();
        bob.commit(&game, id, 1, 2 * ETHER, "pw").await.unwrap();

        assert!(matches!(
            alice.commit(&game, id, 1, ETHER, "pw").await,
            Err(GameError::AlreadyCommitted)
        ));
        // a rejected commit must not leave a ticket behind
        let carol = Participant::new(Address([3; 20]));
        assert!(matches!(
            carol.commit(&game, id, 1, 0, "pw").await,
            Err(GameError::ZeroAmount)
        ));
        assert!(carol.pending_rounds(&game).await.unwrap().is_empty());
        assert_eq!(alice.pending_rounds(&game).await.unwrap(), vec![id]);
        assert_eq!(alice.load_ticket(&game, id, "pw").await.unwrap().choice, 0);

        clock.set(10);
        game.start_reveal(id).await.unwrap();
        assert!(alice.reveal(&game, id, "wrong").await.is_err());
        assert_eq!(alice.reveal(&game, id, "pw").await.unwrap(), 0);
        assert_eq!(bob.reveal(&game, id, "pw").await.unwrap(), 1);

        clock.set(20);
        game.finalize(id).await.unwrap();
        assert_eq!(
            alice.claim(&game, id).await.unwrap(),
            ClaimOutcome::Paid(3 * ETHER)
        );
        assert!(alice.pending_rounds(&game).await.unwrap().is_empty());
        assert!(matches!(
            alice.reveal(&game, id, "pw").await,
            Err(GameError::MissingTicket(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_commits_keep_the_landed_ticket() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let game = Arc::new(
            MinorityGame::with_storage(storage, GameConfig::default(), Arc::new(ManualClock::new(0)))
                .await
                .unwrap(),
        );
        let alice = Participant::new(Address([1; 20]));

        for _ in 0..50 {
            let id = game
                .create_round(
                    Address([0xc0; 20]),
                    "q",
                    vec!["a".into(), "b".into()],
                    Duration::from_secs(10),
                    Duration::from_secs(10),
                )
                .await
                .unwrap();

            let first = tokio::spawn({
                let game = game.clone();
                async move { alice.commit(&game, id, 0, ETHER, "pw").await }
            });
            let second = tokio::spawn({
                let game = game.clone();
                async move { alice.commit(&game, id, 1, ETHER, "pw").await }
            });
            let results = [first.await.unwrap(), second.await.unwrap()];

            let landed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
            assert_eq!(landed.len(), 1);
            assert!(results
                .iter()
                .any(|r| matches!(r, Err(GameError::AlreadyCommitted))));

            // the stored ticket must open the commitment that was accepted
            let commitment = game
                .get_commitment(id, &alice.address())
                .await
                .unwrap()
                .unwrap();
            let ticket = alice.load_ticket(&game, id, "pw").await.unwrap();
            assert_eq!(ticket.commit_hash, commitment.commit_hash);
            assert_eq!(ticket.choice, landed[0].choice);
        }
    }
}
