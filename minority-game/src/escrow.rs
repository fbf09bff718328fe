//! Escrow and payout engine.
//!
//! A `RoundLedger` owns one round together with every commitment made to it.
//! It is the only writer of `option_totals`, `total_bets` and the payout
//! counters; all entry points are stage gated through `Round`.

use crate::commitment::{verify_reveal, CommitHash};
use crate::round::{Round, RoundId};
use crate::{GameError, Result};
use minority_core::{Address, Wei, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A participant's locked bet in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub participant: Address,
    pub commit_hash: CommitHash,
    pub escrowed_amount: Wei,
    pub revealed: bool,
    /// Only set once a reveal verified.
    pub choice: Option<usize>,
    pub claimed: bool,
    pub committed_at: u64,
}

/// Result of a successful claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimOutcome {
    /// Revealed the winning option and received this amount.
    Paid(Wei),
    /// Never revealed; the deposit went to the protocol sink.
    Confiscated(Wei),
}

impl ClaimOutcome {
    pub fn amount(&self) -> Wei {
        match self {
            ClaimOutcome::Paid(amount) | ClaimOutcome::Confiscated(amount) => *amount,
        }
    }
}

/// Where the escrow of a round currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub round_id: RoundId,
    pub total_bets: Wei,
    pub total_paid: Wei,
    pub total_confiscated: Wei,
    /// Still owed to winners or still to be confiscated.
    pub outstanding: Wei,
    /// Left in escrow by truncating winner shares.
    pub dust: Wei,
}

impl Settlement {
    pub fn is_complete(&self) -> bool {
        self.outstanding == 0
    }
}

#[derive(Debug, Clone)]
pub struct RoundLedger {
    round: Round,
    /// Acceptance order.
    commitments: Vec<Commitment>,
    index: HashMap<Address, usize>,
}

impl RoundLedger {
    pub fn new(round: Round) -> Self {
        Self {
            round,
            commitments: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild from persisted parts. `commitments` must be in acceptance order.
    pub fn from_parts(round: Round, commitments: Vec<Commitment>) -> Self {
        let index = commitments
            .iter()
            .enumerate()
            .map(|(i, c)| (c.participant, i))
            .collect();
        Self {
            round,
            commitments,
            index,
        }
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub(crate) fn round_mut(&mut self) -> &mut Round {
        &mut self.round
    }

    pub fn id(&self) -> RoundId {
        self.round.id
    }

    pub fn commitments(&self) -> &[Commitment] {
        &self.commitments
    }

    pub fn commitment(&self, participant: &Address) -> Option<&Commitment> {
        self.index.get(participant).map(|&i| &self.commitments[i])
    }

    pub fn participants(&self) -> Vec<Address> {
        self.commitments.iter().map(|c| c.participant).collect()
    }

    fn commitment_mut(&mut self, participant: &Address) -> Result<&mut Commitment> {
        match self.index.get(participant) {
            Some(&i) => Ok(&mut self.commitments[i]),
            None => Err(GameError::NotParticipant(*participant)),
        }
    }

    /// Lock `amount` behind `commit_hash` for `participant`.
    pub fn commit(
        &mut self,
        participant: Address,
        commit_hash: CommitHash,
        amount: Wei,
        now: u64,
    ) -> Result<()> {
        self.round.ensure_accepting_commits(now)?;

        if amount == 0 {
            return Err(GameError::ZeroAmount);
        }

        if self.index.contains_key(&participant) {
            return Err(GameError::AlreadyCommitted);
        }

        let total_bets = self
            .round
            .total_bets
            .checked_add(amount)
            .ok_or(GameError::AmountOverflow)?;

        self.round.total_bets = total_bets;
        self.index.insert(participant, self.commitments.len());
        self.commitments.push(Commitment {
            participant,
            commit_hash,
            escrowed_amount: amount,
            revealed: false,
            choice: None,
            claimed: false,
            committed_at: now,
        });

        Ok(())
    }

    /// Open a commitment. Credits the escrowed amount to `choice`.
    pub fn reveal(
        &mut self,
        participant: &Address,
        choice: usize,
        secret: &H256,
        now: u64,
    ) -> Result<()> {
        self.round.ensure_accepting_reveals(now)?;

        let round_id = self.round.id;
        let options = self.round.options.len();
        let commitment = self.commitment_mut(participant)?;

        if commitment.revealed {
            return Err(GameError::AlreadyRevealed);
        }

        verify_reveal(&commitment.commit_hash, round_id, choice, secret, participant)?;

        // a well-formed hash over an out of range choice still cannot be counted
        if choice >= options {
            return Err(GameError::InvalidChoice { choice, options });
        }

        let amount = commitment.escrowed_amount;
        let total = self.round.option_totals[choice]
            .checked_add(amount)
            .ok_or(GameError::AmountOverflow)?;

        let commitment = self.commitment_mut(participant)?;
        commitment.revealed = true;
        commitment.choice = Some(choice);
        self.round.option_totals[choice] = total;

        Ok(())
    }

    /// Close the round and pick the minority option.
    pub fn finalize(&mut self, now: u64) -> Result<Option<usize>> {
        self.round.ensure_finalizable(now)?;
        let winner = select_minority(&self.round.option_totals);
        self.round.seal_result(winner)?;
        Ok(winner)
    }

    /// Revealed stakes on every option except the winner.
    fn losing_pool(&self, winner: usize) -> Wei {
        self.round
            .option_totals
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != winner)
            .map(|(_, total)| *total)
            .sum()
    }

    /// What `participant` is owed. Zero for non-revealers, losers and strangers.
    pub fn calculate_reward(&self, participant: &Address) -> Result<Wei> {
        if !self.round.finalized {
            return Err(GameError::NotFinalized);
        }

        let Some(commitment) = self.commitment(participant) else {
            return Ok(0);
        };

        let winner = match (self.round.winning_option, commitment.choice) {
            (Some(winner), Some(choice)) if commitment.revealed && choice == winner => winner,
            _ => return Ok(0),
        };

        let bet = commitment.escrowed_amount;
        let winning_total = self.round.option_totals[winner];
        let share = mul_div(bet, self.losing_pool(winner), winning_total)
            .ok_or(GameError::RewardOverflow(bet))?;

        bet.checked_add(share).ok_or(GameError::RewardOverflow(bet))
    }

    /// Pay a winner or confiscate a non-revealer's deposit, exactly once.
    pub fn claim(&mut self, participant: &Address) -> Result<ClaimOutcome> {
        if !self.round.finalized {
            return Err(GameError::NotFinalized);
        }

        let commitment = self
            .commitment(participant)
            .ok_or(GameError::NotParticipant(*participant))?;

        if commitment.claimed {
            return Err(GameError::AlreadyClaimed);
        }

        let outcome = if commitment.revealed {
            let reward = self.calculate_reward(participant)?;
            if reward == 0 {
                return Err(GameError::NoReward);
            }
            ClaimOutcome::Paid(reward)
        } else {
            ClaimOutcome::Confiscated(commitment.escrowed_amount)
        };

        match outcome {
            ClaimOutcome::Paid(amount) => {
                self.round.total_paid = self
                    .round
                    .total_paid
                    .checked_add(amount)
                    .ok_or(GameError::RewardOverflow(amount))?;
            }
            ClaimOutcome::Confiscated(amount) => {
                self.round.total_confiscated = self
                    .round
                    .total_confiscated
                    .checked_add(amount)
                    .ok_or(GameError::AmountOverflow)?;
            }
        }

        self.commitment_mut(participant)?.claimed = true;
        self.round.mark_claiming();

        Ok(outcome)
    }

    pub fn settlement(&self) -> Result<Settlement> {
        let round = &self.round;

        let outstanding = if round.finalized {
            let mut owed: Wei = 0;
            for c in self.commitments.iter().filter(|c| !c.claimed) {
                let due = if c.revealed {
                    self.calculate_reward(&c.participant)?
                } else {
                    c.escrowed_amount
                };
                owed = owed.checked_add(due).ok_or(GameError::AmountOverflow)?;
            }
            owed
        } else {
            round.total_bets
        };

        let accounted = round
            .total_paid
            .saturating_add(round.total_confiscated)
            .saturating_add(outstanding);

        Ok(Settlement {
            round_id: round.id,
            total_bets: round.total_bets,
            total_paid: round.total_paid,
            total_confiscated: round.total_confiscated,
            outstanding,
            dust: round.total_bets.saturating_sub(accounted),
        })
    }
}

/// Option with the strictly smallest non-zero total. Ties go to the lowest index.
pub fn select_minority(option_totals: &[Wei]) -> Option<usize> {
    option_totals
        .iter()
        .enumerate()
        .filter(|(_, total)| **total > 0)
        .min_by(|(ia, a), (ib, b)| a.cmp(b).then(ia.cmp(ib)))
        .map(|(i, _)| i)
}

/// `a * b / c` with a 256-bit intermediate, truncating. `None` if `c == 0`
/// or the quotient does not fit.
pub fn mul_div(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }

    let (hi, lo) = widening_mul(a, b);
    if hi >= c {
        return None;
    }

    // restoring division of (hi, lo) by c; rem < c throughout
    let mut rem = hi;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quotient |= 1;
        }
    }

    Some(quotient)
}

fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;

    let (a1, a0) = (a >> 64, a & MASK);
    let (b1, b0) = (b >> 64, b & MASK);

    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;

    let mid = (p00 >> 64) + (p01 & MASK) + (p10 & MASK);
    let lo = (p00 & MASK) | (mid << 64);
    let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);

    (hi, lo)
}
