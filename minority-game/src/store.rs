use crate::escrow::{Commitment, RoundLedger};
use crate::round::{Round, RoundId, Stage};
use crate::{GameError, Result};
use minority_core::{Address, MinorityError, Storage, Wei, H256};
use rusqlite::params;

/// Durable copy of every round ledger.
pub struct RoundStore<'a> {
    storage: &'a Storage,
}

struct RoundRow {
    id: i64,
    creator: String,
    question: String,
    options: String,
    stage: String,
    created_at: i64,
    commit_deadline: i64,
    reveal_deadline: Option<i64>,
    reveal_duration: i64,
    option_totals: String,
    total_bets: String,
    total_paid: String,
    total_confiscated: String,
    winning_option: Option<i64>,
    finalized: bool,
}

struct CommitmentRow {
    participant: String,
    commit_hash: String,
    escrowed_amount: String,
    revealed: bool,
    choice: Option<i64>,
    claimed: bool,
    committed_at: i64,
}

impl<'a> RoundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Write the round and all of its commitments in one transaction.
    pub async fn save(&self, ledger: &RoundLedger) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let round = ledger.round();
        let totals: Vec<String> = round.option_totals.iter().map(|t| t.to_string()).collect();

        tx.execute(
            "INSERT OR REPLACE INTO rounds
             (id, creator, question, options, stage, created_at, commit_deadline, reveal_deadline,
              reveal_duration, option_totals, total_bets, total_paid, total_confiscated,
              winning_option, finalized)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                round.id as i64,
                round.creator.to_string(),
                round.question,
                serde_json::to_string(&round.options)?,
                round.stage.as_str(),
                round.created_at as i64,
                round.commit_deadline as i64,
                round.reveal_deadline.map(|d| d as i64),
                round.reveal_duration as i64,
                serde_json::to_string(&totals)?,
                round.total_bets.to_string(),
                round.total_paid.to_string(),
                round.total_confiscated.to_string(),
                round.winning_option.map(|o| o as i64),
                round.finalized,
            ],
        )?;

        for (seq, c) in ledger.commitments().iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO commitments
                 (round_id, participant, seq, commit_hash, escrowed_amount, revealed, choice,
                  claimed, committed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    round.id as i64,
                    c.participant.to_string(),
                    seq as i64,
                    c.commit_hash.to_string(),
                    c.escrowed_amount.to_string(),
                    c.revealed,
                    c.choice.map(|o| o as i64),
                    c.claimed,
                    c.committed_at as i64,
                ],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            "Saved round {} ({} commitments, stage {})",
            round.id,
            ledger.commitments().len(),
            round.stage.as_str()
        );
        Ok(())
    }

    /// Every stored round, ordered by id.
    pub async fn load_all(&self) -> Result<Vec<RoundLedger>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, creator, question, options, stage, created_at, commit_deadline,
                    reveal_deadline, reveal_duration, option_totals, total_bets, total_paid,
                    total_confiscated, winning_option, finalized
             FROM rounds ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RoundRow {
                    id: row.get(0)?,
                    creator: row.get(1)?,
                    question: row.get(2)?,
                    options: row.get(3)?,
                    stage: row.get(4)?,
                    created_at: row.get(5)?,
                    commit_deadline: row.get(6)?,
                    reveal_deadline: row.get(7)?,
                    reveal_duration: row.get(8)?,
                    option_totals: row.get(9)?,
                    total_bets: row.get(10)?,
                    total_paid: row.get(11)?,
                    total_confiscated: row.get(12)?,
                    winning_option: row.get(13)?,
                    finalized: row.get(14)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut commit_stmt = conn.prepare(
            "SELECT participant, commit_hash, escrowed_amount, revealed, choice, claimed, committed_at
             FROM commitments WHERE round_id = ?1 ORDER BY seq",
        )?;

        let mut ledgers = Vec::with_capacity(rows.len());
        for row in rows {
            let commitments = commit_stmt
                .query_map(params![row.id], |r| {
                    Ok(CommitmentRow {
                        participant: r.get(0)?,
                        commit_hash: r.get(1)?,
                        escrowed_amount: r.get(2)?,
                        revealed: r.get(3)?,
                        choice: r.get(4)?,
                        claimed: r.get(5)?,
                        committed_at: r.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .map(CommitmentRow::into_commitment)
                .collect::<Result<Vec<_>>>()?;

            ledgers.push(RoundLedger::from_parts(row.into_round()?, commitments));
        }

        tracing::debug!("Loaded {} rounds", ledgers.len());
        Ok(ledgers)
    }

    pub async fn next_round_id(&self) -> Result<RoundId> {
        let conn = self.storage.get_connection().await;
        let max: Option<i64> = conn.query_row("SELECT MAX(id) FROM rounds", [], |row| row.get(0))?;
        Ok(max.map(|id| id as u64 + 1).unwrap_or(1))
    }
}

fn parse_wei(raw: &str) -> Result<Wei> {
    raw.parse()
        .map_err(|_| corrupt(format!("bad amount '{}'", raw)))
}

fn corrupt(msg: String) -> GameError {
    GameError::Core(MinorityError::decode(format!("Corrupt round store: {}", msg)))
}

impl RoundRow {
    fn into_round(self) -> Result<Round> {
        let stage =
            Stage::parse(&self.stage).ok_or_else(|| corrupt(format!("bad stage '{}'", self.stage)))?;
        let totals: Vec<String> = serde_json::from_str(&self.option_totals)?;

        Ok(Round {
            id: self.id as u64,
            creator: self.creator.parse::<Address>()?,
            question: self.question,
            options: serde_json::from_str(&self.options)?,
            stage,
            created_at: self.created_at as u64,
            commit_deadline: self.commit_deadline as u64,
            reveal_deadline: self.reveal_deadline.map(|d| d as u64),
            reveal_duration: self.reveal_duration as u64,
            option_totals: totals.iter().map(|t| parse_wei(t)).collect::<Result<_>>()?,
            total_bets: parse_wei(&self.total_bets)?,
            total_paid: parse_wei(&self.total_paid)?,
            total_confiscated: parse_wei(&self.total_confiscated)?,
            winning_option: self.winning_option.map(|o| o as usize),
            finalized: self.finalized,
        })
    }
}

impl CommitmentRow {
    fn into_commitment(self) -> Result<Commitment> {
        Ok(Commitment {
            participant: self.participant.parse::<Address>()?,
            commit_hash: self.commit_hash.parse::<H256>()?,
            escrowed_amount: parse_wei(&self.escrowed_amount)?,
            revealed: self.revealed,
            choice: self.choice.map(|o| o as usize),
            claimed: self.claimed,
            committed_at: self.committed_at as u64,
        })
    }
}
