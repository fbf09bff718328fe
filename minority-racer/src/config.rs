use crate::bidder::BidPolicy;
use crate::{RacerError, Result};
use minority_core::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Where matched transactions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Node-side pending-transaction filter drained into a channel.
    Push,
    /// Diff successive snapshots of the pending block.
    Poll,
}

impl FromStr for FeedMode {
    type Err = RacerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "push" => Ok(FeedMode::Push),
            "poll" => Ok(FeedMode::Poll),
            other => Err(RacerError::config(format!(
                "unknown feed mode '{}', expected push or poll",
                other
            ))),
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedMode::Push => write!(f, "push"),
            FeedMode::Poll => write!(f, "poll"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacerConfig {
    /// Contract whose calls are raced.
    pub contract: Address,
    /// Canonical signature of the raced function.
    pub function_signature: String,
    /// Our identity. Must be an account the node can sign for.
    pub own_address: Address,
    pub mode: FeedMode,
    pub poll_interval: Duration,
    /// How often the push producer drains the node filter.
    pub filter_poll_interval: Duration,
    /// Heartbeat log every this many poll intervals.
    pub heartbeat_every: u32,
    pub seen_capacity: usize,
    pub seen_retain: usize,
    pub feed_buffer: usize,
    /// Stop on our own after this long. `None` runs until shut down.
    pub run_timeout: Option<Duration>,
    pub stop_after_first_win: bool,
    pub bid: BidPolicy,
}

impl Default for RacerConfig {
    fn default() -> Self {
        Self {
            // first contract deployed on a fresh Anvil/Hardhat node
            contract: Address([
                0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f,
                0x64, 0x2f, 0x64, 0x18, 0x0a, 0xa3,
            ]),
            function_signature: "mint()".to_string(),
            own_address: Address::default(),
            mode: FeedMode::Poll,
            poll_interval: Duration::from_millis(50),
            filter_poll_interval: Duration::from_millis(100),
            heartbeat_every: 20,
            seen_capacity: 1000,
            seen_retain: 500,
            feed_buffer: 1024,
            run_timeout: Some(Duration::from_secs(300)),
            stop_after_first_win: false,
            bid: BidPolicy::default(),
        }
    }
}

impl RacerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.own_address == Address::default() {
            return Err(RacerError::config("own_address must be set"));
        }

        if self.contract == Address::default() {
            return Err(RacerError::config("contract must be set"));
        }

        let signature = self.function_signature.trim();
        if signature.is_empty() || !signature.contains('(') || !signature.ends_with(')') {
            return Err(RacerError::config(format!(
                "'{}' is not a canonical function signature",
                self.function_signature
            )));
        }

        if self.poll_interval.is_zero() || self.filter_poll_interval.is_zero() {
            return Err(RacerError::config("Poll intervals must be greater than 0"));
        }

        if self.heartbeat_every == 0 {
            return Err(RacerError::config("heartbeat_every must be greater than 0"));
        }

        if self.seen_retain == 0 || self.seen_retain >= self.seen_capacity {
            return Err(RacerError::config(
                "seen_retain must be greater than 0 and below seen_capacity",
            ));
        }

        if self.feed_buffer == 0 {
            return Err(RacerError::config("feed_buffer must be greater than 0"));
        }

        self.bid.validate()
    }
}
