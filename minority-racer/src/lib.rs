//! minority-racer - mempool observation and competitive bidding
//!
//! Watches a node's pending transactions for calls to one contract function,
//! copies each match with a higher fee, and reports from chain state whether
//! the copy actually won.

pub mod bidder;
pub mod config;
pub mod error;
pub mod filter;
pub mod observer;
pub mod probe;
pub mod seen;
pub mod telemetry;

#[cfg(test)]
mod mock;

pub use bidder::{BidPolicy, CompetitiveBidder, MatchHandler};
pub use config::{FeedMode, RacerConfig};
pub use error::{RacerError, Result};
pub use filter::TargetFilter;
pub use observer::{MempoolObserver, ObserverStats, StopReason};
pub use probe::{Expectation, NextTokenOwnerProbe, OutcomeProbe, Verdict};
pub use seen::SeenSet;
pub use telemetry::{RaceOutcome, RaceReport, RaceTelemetry, TelemetrySnapshot};
