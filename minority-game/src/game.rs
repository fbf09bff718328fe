use crate::clock::{Clock, SystemClock};
use crate::commitment::CommitHash;
use crate::config::GameConfig;
use crate::escrow::{ClaimOutcome, Commitment, RoundLedger, Settlement};
use crate::round::{Round, RoundId};
use crate::store::RoundStore;
use crate::{GameError, Result};
use minority_core::{Address, Storage, Wei, H256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct Ledger {
    rounds: BTreeMap<RoundId, RoundLedger>,
    next_id: RoundId,
}

/// The minority game service. Owns every round and is the single writer of
/// their escrow; each mutation is persisted before it becomes visible.
pub struct MinorityGame {
    config: GameConfig,
    clock: Arc<dyn Clock>,
    storage: Arc<Storage>,
    ledger: Mutex<Ledger>,
}

impl MinorityGame {
    /// Open (or create) `minority.db` under `data_dir` and reload its rounds.
    pub async fn open(data_dir: &Path, config: GameConfig) -> Result<Self> {
        let db_path = data_dir.join("minority.db");
        let storage = Arc::new(Storage::new(&db_path).await?);
        Self::with_storage(storage, config, Arc::new(SystemClock)).await
    }

    pub async fn with_storage(
        storage: Arc<Storage>,
        config: GameConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let store = RoundStore::new(&storage);
        let next_id = store.next_round_id().await?;
        let rounds: BTreeMap<_, _> = store
            .load_all()
            .await?
            .into_iter()
            .map(|ledger| (ledger.id(), ledger))
            .collect();

        tracing::info!(
            "Minority game ready: {} rounds loaded, next id {}",
            rounds.len(),
            next_id
        );

        Ok(Self {
            config,
            clock,
            storage,
            ledger: Mutex::new(Ledger { rounds, next_id }),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Apply `op` to a copy of the round, persist it, then swap it in.
    /// On any error the stored and in-memory round are untouched.
    async fn mutate<T, F>(&self, round_id: RoundId, op: F) -> Result<T>
    where
        F: FnOnce(&mut RoundLedger, u64) -> Result<T>,
    {
        let mut ledger = self.ledger.lock().await;
        let current = ledger
            .rounds
            .get(&round_id)
            .ok_or(GameError::RoundNotFound(round_id))?;

        let mut next = current.clone();
        let value = op(&mut next, self.clock.now())?;

        RoundStore::new(&self.storage).save(&next).await?;
        ledger.rounds.insert(round_id, next);

        Ok(value)
    }

    async fn read<T, F>(&self, round_id: RoundId, op: F) -> Result<T>
    where
        F: FnOnce(&RoundLedger) -> Result<T>,
    {
        let ledger = self.ledger.lock().await;
        let round = ledger
            .rounds
            .get(&round_id)
            .ok_or(GameError::RoundNotFound(round_id))?;
        op(round)
    }

    /// Create a round and open its commit phase. Zero durations use the defaults.
    pub async fn create_round(
        &self,
        creator: Address,
        question: &str,
        options: Vec<String>,
        commit_duration: Duration,
        reveal_duration: Duration,
    ) -> Result<RoundId> {
        let mut ledger = self.ledger.lock().await;
        let id = ledger.next_id;
        let now = self.clock.now();

        let mut round = Round::new(
            id,
            creator,
            question,
            options,
            now,
            self.config.commit_secs(commit_duration),
            self.config.reveal_secs(reveal_duration),
            &self.config,
        )?;
        round.open_commit()?;

        let round_ledger = RoundLedger::new(round);
        RoundStore::new(&self.storage).save(&round_ledger).await?;

        tracing::info!(
            "Created round {} '{}' with {} options, commits close at {}",
            id,
            round_ledger.round().question,
            round_ledger.round().options.len(),
            round_ledger.round().commit_deadline
        );

        ledger.rounds.insert(id, round_ledger);
        ledger.next_id = id + 1;
        Ok(id)
    }

    pub async fn commit(
        &self,
        round_id: RoundId,
        participant: Address,
        commit_hash: CommitHash,
        amount: Wei,
    ) -> Result<()> {
        self.mutate(round_id, |ledger, now| {
            ledger.commit(participant, commit_hash, amount, now)
        })
        .await?;

        tracing::info!(
            "Round {}: {} committed {} wei",
            round_id,
            participant.short(),
            amount
        );
        Ok(())
    }

    /// Open the reveal phase. Anyone may call this once commits have closed.
    pub async fn start_reveal(&self, round_id: RoundId) -> Result<u64> {
        let deadline = self
            .mutate(round_id, |ledger, now| ledger.round_mut().start_reveal(now))
            .await?;

        tracing::info!("Round {}: reveal phase open until {}", round_id, deadline);
        Ok(deadline)
    }

    pub async fn reveal(
        &self,
        round_id: RoundId,
        participant: Address,
        choice: usize,
        secret: H256,
    ) -> Result<()> {
        let result = self
            .mutate(round_id, |ledger, now| {
                ledger.reveal(&participant, choice, &secret, now)
            })
            .await;

        match &result {
            Ok(()) => tracing::info!(
                "Round {}: {} revealed option {}",
                round_id,
                participant.short(),
                choice
            ),
            Err(GameError::HashMismatch) => tracing::warn!(
                "Round {}: reveal from {} does not match its commitment",
                round_id,
                participant.short()
            ),
            Err(_) => {}
        }
        result
    }

    /// Close the round. Returns the winning option, `None` if nobody revealed.
    pub async fn finalize(&self, round_id: RoundId) -> Result<Option<usize>> {
        let winner = self
            .mutate(round_id, |ledger, now| ledger.finalize(now))
            .await?;

        match winner {
            Some(option) => tracing::info!("Round {} finalized, minority option {}", round_id, option),
            None => tracing::info!("Round {} finalized without reveals, no winner", round_id),
        }
        Ok(winner)
    }

    pub async fn calculate_reward(&self, round_id: RoundId, participant: &Address) -> Result<Wei> {
        self.read(round_id, |ledger| ledger.calculate_reward(participant))
            .await
    }

    pub async fn claim_reward(
        &self,
        round_id: RoundId,
        participant: Address,
    ) -> Result<ClaimOutcome> {
        let outcome = self
            .mutate(round_id, |ledger, _| ledger.claim(&participant))
            .await?;

        match outcome {
            ClaimOutcome::Paid(amount) => tracing::info!(
                "Round {}: paid {} wei to {}",
                round_id,
                amount,
                participant.short()
            ),
            ClaimOutcome::Confiscated(amount) => tracing::warn!(
                "Round {}: confiscated {} wei deposit of {} (never revealed)",
                round_id,
                amount,
                participant.short()
            ),
        }
        Ok(outcome)
    }

    pub async fn get_round_info(&self, round_id: RoundId) -> Result<Round> {
        self.read(round_id, |ledger| Ok(ledger.round().clone())).await
    }

    pub async fn get_option_total(&self, round_id: RoundId, option: usize) -> Result<Wei> {
        self.read(round_id, |ledger| ledger.round().option_total(option))
            .await
    }

    /// Committed participants in acceptance order.
    pub async fn get_participants(&self, round_id: RoundId) -> Result<Vec<Address>> {
        self.read(round_id, |ledger| Ok(ledger.participants())).await
    }

    pub async fn get_commitment(
        &self,
        round_id: RoundId,
        participant: &Address,
    ) -> Result<Option<Commitment>> {
        self.read(round_id, |ledger| Ok(ledger.commitment(participant).cloned()))
            .await
    }

    /// Rounds not yet finalized.
    pub async fn active_rounds(&self) -> Vec<Round> {
        let ledger = self.ledger.lock().await;
        ledger
            .rounds
            .values()
            .map(|l| l.round())
            .filter(|r| r.is_active())
            .cloned()
            .collect()
    }

    pub async fn all_rounds(&self) -> Vec<Round> {
        let ledger = self.ledger.lock().await;
        ledger.rounds.values().map(|l| l.round().clone()).collect()
    }

    pub async fn round_count(&self) -> u64 {
        let ledger = self.ledger.lock().await;
        ledger.rounds.len() as u64
    }

    pub async fn settlement(&self, round_id: RoundId) -> Result<Settlement> {
        self.read(round_id, |ledger| ledger.settlement()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::commitment::{compute_commit_hash, RevealTicket};
    use crate::round::Stage;
    use minority_core::units::ETHER;

    async fn game(clock: Arc<ManualClock>) -> MinorityGame {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        MinorityGame::with_storage(storage, GameConfig::default(), clock)
            .await
            .unwrap()
    }

    fn opts(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_full_round() {
        let clock = Arc::new(ManualClock::new(1_000));
        let game = game(clock.clone()).await;
        let creator = Address([0xc0; 20]);

        let id = game
            .create_round(creator, "Best season?", opts(&["spring", "winter"]), Duration::ZERO, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(id, 1);

        let round = game.get_round_info(id).await.unwrap();
        assert_eq!(round.stage, Stage::Committing);
        assert_eq!(round.commit_deadline, 1_000 + 3600);

        let alice = RevealTicket::new(id, Address([1; 20]), 0, ETHER);
        let bob = RevealTicket::new(id, Address([2; 20]), 1, 2 * ETHER);
        let carol = RevealTicket::new(id, Address([3; 20]), 1, 3 * ETHER);
        for t in [&alice, &bob, &carol] {
            game.commit(id, t.participant, t.commit_hash, t.amount).await.unwrap();
        }
        assert_eq!(
            game.get_participants(id).await.unwrap(),
            vec![alice.participant, bob.participant, carol.participant]
        );

        assert!(matches!(game.start_reveal(id).await, Err(GameError::RevealTooEarly { .. })));
        clock.advance(3600);
        game.start_reveal(id).await.unwrap();

        for t in [&alice, &bob, &carol] {
            game.reveal(id, t.participant, t.choice, t.secret).await.unwrap();
        }
        assert_eq!(game.get_option_total(id, 0).await.unwrap(), ETHER);
        assert_eq!(game.get_option_total(id, 1).await.unwrap(), 5 * ETHER);

        assert!(matches!(game.finalize(id).await, Err(GameError::FinalizeTooEarly)));
        clock.advance(1800);
        assert_eq!(game.finalize(id).await.unwrap(), Some(0));
        assert!(matches!(game.finalize(id).await, Err(GameError::AlreadyFinalized)));

        assert_eq!(game.calculate_reward(id, &alice.participant).await.unwrap(), 6 * ETHER);
        assert_eq!(
            game.claim_reward(id, alice.participant).await.unwrap(),
            ClaimOutcome::Paid(6 * ETHER)
        );
        assert!(matches!(
            game.claim_reward(id, alice.participant).await,
            Err(GameError::AlreadyClaimed)
        ));

        let s = game.settlement(id).await.unwrap();
        assert_eq!(s.total_paid, 6 * ETHER);
        assert!(s.is_complete());
        assert!(game.active_rounds().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_operations_do_not_mutate() {
        let clock = Arc::new(ManualClock::new(0));
        let game = game(clock.clone()).await;
        let id = game
            .create_round(Address([0xc0; 20]), "q", opts(&["a", "b"]), Duration::from_secs(10), Duration::from_secs(10))
            .await
            .unwrap();

        let who = Address([1; 20]);
        let secret = H256([9; 32]);
        game.commit(id, who, compute_commit_hash(id, 0, &secret, &who), ETHER)
            .await
            .unwrap();
        assert!(matches!(
            game.commit(id, who, compute_commit_hash(id, 1, &secret, &who), ETHER).await,
            Err(GameError::AlreadyCommitted)
        ));

        clock.set(10);
        game.start_reveal(id).await.unwrap();
        assert!(matches!(
            game.reveal(id, who, 1, secret).await,
            Err(GameError::HashMismatch)
        ));

        let round = game.get_round_info(id).await.unwrap();
        assert_eq!(round.total_bets, ETHER);
        assert_eq!(round.option_totals, vec![0, 0]);
        assert!(!game.get_commitment(id, &who).await.unwrap().unwrap().revealed);

        assert!(matches!(game.get_round_info(99).await, Err(GameError::RoundNotFound(99))));
        assert!(matches!(
            game.create_round(Address([0xc0; 20]), "q", opts(&["a"]), Duration::ZERO, Duration::ZERO).await,
            Err(GameError::OptionCount { .. })
        ));
        assert_eq!(game.round_count().await, 1);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let who = Address([1; 20]);
        let secret = H256([5; 32]);

        {
            let storage = Arc::new(Storage::new(&dir.path().join("minority.db")).await.unwrap());
            let game = MinorityGame::with_storage(storage, GameConfig::default(), clock.clone())
                .await
                .unwrap();
            let id = game
                .create_round(Address([0xc0; 20]), "q", opts(&["a", "b"]), Duration::from_secs(10), Duration::from_secs(10))
                .await
                .unwrap();
            game.commit(id, who, compute_commit_hash(id, 1, &secret, &who), ETHER)
                .await
                .unwrap();
        }

        let storage = Arc::new(Storage::new(&dir.path().join("minority.db")).await.unwrap());
        let game = MinorityGame::with_storage(storage, GameConfig::default(), clock.clone())
            .await
            .unwrap();
        assert_eq!(game.round_count().await, 1);
        assert!(matches!(
            game.commit(1, who, compute_commit_hash(1, 1, &secret, &who), ETHER).await,
            Err(GameError::AlreadyCommitted)
        ));

        clock.set(10);
        game.start_reveal(1).await.unwrap();
        game.reveal(1, who, 1, secret).await.unwrap();
        clock.set(20);
        assert_eq!(game.finalize(1).await.unwrap(), Some(1));

        let next = game
            .create_round(Address([0xc0; 20]), "again", opts(&["x", "y"]), Duration::ZERO, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(next, 2);
    }
}
