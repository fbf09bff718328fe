//! Commit-reveal minority game
//!
//! Participants commit a hash of (round, choice, secret, address) together with a
//! stake, reveal once commits close, and the option backed by the least revealed
//! stake wins. Winners split the other revealed stakes pro rata; anyone who never
//! revealed forfeits their deposit.

pub mod clock;
pub mod commitment;
pub mod config;
pub mod error;
pub mod escrow;
pub mod game;
pub mod participant;
pub mod round;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use commitment::{compute_commit_hash, generate_secret, verify_reveal, CommitHash, RevealTicket};
pub use config::GameConfig;
pub use error::{ErrorKind, GameError, Result};
pub use escrow::{select_minority, ClaimOutcome, Commitment, RoundLedger, Settlement};
pub use game::MinorityGame;
pub use participant::Participant;
pub use round::{Round, RoundId, Stage};
pub use store::RoundStore;
