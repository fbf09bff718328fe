use crate::round::Stage;
use minority_core::{Address, MinorityError, Wei};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

/// Broad class of a rejection, for callers deciding between retry and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Stage,
    Crypto,
    Economic,
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Core error: {0}")]
    Core(#[from] MinorityError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Round not found: {0}")]
    RoundNotFound(u64),

    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Round needs between {min} and {max} options, got {count}")]
    OptionCount { count: usize, min: usize, max: usize },

    #[error("Option {0} cannot be empty")]
    EmptyOption(usize),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Amount overflows the round's escrow")]
    AmountOverflow,

    #[error("Choice {choice} out of range for {options} options")]
    InvalidChoice { choice: usize, options: usize },

    #[error("Participant {0} has no commitment in this round")]
    NotParticipant(Address),

    #[error("No sealed reveal ticket for round {0}")]
    MissingTicket(u64),

    #[error("Commit phase not started")]
    CommitPhaseNotStarted,

    #[error("Commit phase ended")]
    CommitPhaseEnded,

    #[error("Commit phase still running until {commit_deadline}")]
    RevealTooEarly { commit_deadline: u64 },

    #[error("Not in reveal phase")]
    NotInRevealPhase,

    #[error("Reveal phase ended")]
    RevealPhaseEnded,

    #[error("Too early to finalize")]
    FinalizeTooEarly,

    #[error("Already finalized")]
    AlreadyFinalized,

    #[error("Round not finalized")]
    NotFinalized,

    #[error("Illegal stage transition from {from:?} to {to:?}")]
    IllegalTransition { from: Stage, to: Stage },

    #[error("Hash mismatch")]
    HashMismatch,

    #[error("Already committed")]
    AlreadyCommitted,

    #[error("Already revealed")]
    AlreadyRevealed,

    #[error("Already claimed")]
    AlreadyClaimed,

    #[error("No reward to claim (revealed a losing option)")]
    NoReward,

    #[error("Reward of {0} wei cannot be represented")]
    RewardOverflow(Wei),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        use GameError::*;
        match self {
            Core(_) | Serialization(_) | Storage(_) => ErrorKind::Infrastructure,
            RoundNotFound(_)
            | EmptyQuestion
            | OptionCount { .. }
            | EmptyOption(_)
            | ZeroAmount
            | AmountOverflow
            | InvalidChoice { .. }
            | NotParticipant(_)
            | MissingTicket(_) => ErrorKind::Validation,
            CommitPhaseNotStarted
            | CommitPhaseEnded
            | RevealTooEarly { .. }
            | NotInRevealPhase
            | RevealPhaseEnded
            | FinalizeTooEarly
            | AlreadyFinalized
            | NotFinalized
            | IllegalTransition { .. } => ErrorKind::Stage,
            HashMismatch => ErrorKind::Crypto,
            AlreadyCommitted | AlreadyRevealed | AlreadyClaimed | NoReward | RewardOverflow(_) => {
                ErrorKind::Economic
            }
        }
    }

    /// Stable identifier callers can match on without parsing messages.
    pub fn code(&self) -> &'static str {
        use GameError::*;
        match self {
            Core(_) => "core",
            Serialization(_) => "serialization",
            Storage(_) => "storage",
            RoundNotFound(_) => "round_not_found",
            EmptyQuestion => "empty_question",
            OptionCount { .. } => "option_count",
            EmptyOption(_) => "empty_option",
            ZeroAmount => "zero_amount",
            AmountOverflow => "amount_overflow",
            InvalidChoice { .. } => "invalid_choice",
            NotParticipant(_) => "not_participant",
            MissingTicket(_) => "missing_ticket",
            CommitPhaseNotStarted => "commit_not_started",
            CommitPhaseEnded => "commit_ended",
            RevealTooEarly { .. } => "reveal_too_early",
            NotInRevealPhase => "not_in_reveal_phase",
            RevealPhaseEnded => "reveal_ended",
            FinalizeTooEarly => "finalize_too_early",
            AlreadyFinalized => "already_finalized",
            NotFinalized => "not_finalized",
            IllegalTransition { .. } => "illegal_transition",
            HashMismatch => "hash_mismatch",
            AlreadyCommitted => "already_committed",
            AlreadyRevealed => "already_revealed",
            AlreadyClaimed => "already_claimed",
            NoReward => "no_reward",
            RewardOverflow(_) => "reward_overflow",
        }
    }

    /// Whether the same call could succeed later without any change by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GameError::RevealTooEarly { .. }
                | GameError::FinalizeTooEarly
                | GameError::NotFinalized
                | GameError::Core(_)
                | GameError::Storage(_)
        )
    }
}
