use chrono::{DateTime, Utc};
use minority_core::{FeeParams, TxHash};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

const RECENT_REASONS: usize = 20;

/// How a race ended. Losing is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RaceOutcome {
    Won,
    Lost { reason: String },
    /// Nothing was sent.
    Skipped { reason: String },
    /// An RPC or decoding failure cut the race short.
    Errored { reason: String },
}

impl RaceOutcome {
    pub fn is_won(&self) -> bool {
        matches!(self, RaceOutcome::Won)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RaceOutcome::Won => None,
            RaceOutcome::Lost { reason }
            | RaceOutcome::Skipped { reason }
            | RaceOutcome::Errored { reason } => Some(reason),
        }
    }
}

impl fmt::Display for RaceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceOutcome::Won => write!(f, "won"),
            RaceOutcome::Lost { reason } => write!(f, "lost ({})", reason),
            RaceOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            RaceOutcome::Errored { reason } => write!(f, "errored ({})", reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceReport {
    pub id: Uuid,
    pub target: TxHash,
    pub our_tx: Option<TxHash>,
    pub fees: Option<FeeParams>,
    pub block_number: Option<u64>,
    pub outcome: RaceOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RaceReport {
    pub fn new(target: TxHash) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            our_tx: None,
            fees: None,
            block_number: None,
            outcome: RaceOutcome::Skipped {
                reason: "not started".to_string(),
            },
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub won: u64,
    pub lost: u64,
    pub skipped: u64,
    pub errored: u64,
    /// Newest last.
    pub recent_reasons: Vec<String>,
}

impl TelemetrySnapshot {
    pub fn total(&self) -> u64 {
        self.won + self.lost + self.skipped + self.errored
    }
}

#[derive(Default)]
struct Counters {
    won: u64,
    lost: u64,
    skipped: u64,
    errored: u64,
    recent_reasons: VecDeque<String>,
}

/// Race results collected from dispatched bidder tasks.
#[derive(Default)]
pub struct RaceTelemetry {
    counters: Mutex<Counters>,
}

impl RaceTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, report: &RaceReport) {
        let mut counters = self.counters.lock();
        match &report.outcome {
            RaceOutcome::Won => counters.won += 1,
            RaceOutcome::Lost { .. } => counters.lost += 1,
            RaceOutcome::Skipped { .. } => counters.skipped += 1,
            RaceOutcome::Errored { .. } => counters.errored += 1,
        }

        if let Some(reason) = report.outcome.reason() {
            counters
                .recent_reasons
                .push_back(format!("{}: {}", report.target, reason));
            if counters.recent_reasons.len() > RECENT_REASONS {
                counters.recent_reasons.pop_front();
            }
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let counters = self.counters.lock();
        TelemetrySnapshot {
            won: counters.won,
            lost: counters.lost,
            skipped: counters.skipped,
            errored: counters.errored,
            recent_reasons: counters.recent_reasons.iter().cloned().collect(),
        }
    }

    /// Drain `rx` into `telemetry` until every sender is gone.
    pub fn spawn_collector(
        telemetry: Arc<RaceTelemetry>,
        mut rx: mpsc::Receiver<RaceReport>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(report) = rx.recv().await {
                tracing::debug!("Recording race {} -> {}", report.id, report.outcome);
                telemetry.record(&report);
            }
            let snapshot = telemetry.snapshot();
            tracing::info!(
                "Race telemetry closed: {} won, {} lost, {} skipped, {} errored",
                snapshot.won,
                snapshot.lost,
                snapshot.skipped,
                snapshot.errored
            );
        })
    }
}
