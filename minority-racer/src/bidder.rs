use crate::probe::{OutcomeProbe, Verdict};
use crate::telemetry::{RaceOutcome, RaceReport};
use crate::{RacerError, Result};
use async_trait::async_trait;
use minority_core::rpc::wait_for_receipt;
use minority_core::units::{format_gwei, GWEI};
use minority_core::{Address, ChainClient, FeeParams, PendingTransaction, TxRequest, Wei};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How much to outbid a target by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidPolicy {
    /// Added to the target's priority fee.
    pub priority_bump: Wei,
    /// `max_fee = target.max_fee + priority_bump * max_fee_multiplier`
    pub max_fee_multiplier: u32,
    /// Added to a legacy gas price.
    pub legacy_bump: Wei,
    pub gas_limit: u64,
}

impl Default for BidPolicy {
    fn default() -> Self {
        Self {
            priority_bump: GWEI,
            max_fee_multiplier: 2,
            legacy_bump: 5 * GWEI,
            gas_limit: 300_000,
        }
    }
}

impl BidPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.priority_bump == 0 || self.legacy_bump == 0 {
            return Err(RacerError::config("Fee bumps must be greater than 0"));
        }

        // the new max fee has to cover the bumped tip plus base fee headroom
        if self.max_fee_multiplier < 2 {
            return Err(RacerError::config("max_fee_multiplier must be at least 2"));
        }

        if self.gas_limit == 0 {
            return Err(RacerError::config("Gas limit must be greater than 0"));
        }

        Ok(())
    }

    /// Fees that outrank `target` in the same variant.
    pub fn outbid(&self, target: &FeeParams) -> Result<FeeParams> {
        let overflow = || RacerError::FeeOverflow(format!("{:?}", target));

        match *target {
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let max_fee_bump = self
                    .priority_bump
                    .checked_mul(self.max_fee_multiplier as Wei)
                    .ok_or_else(overflow)?;
                Ok(FeeParams::Eip1559 {
                    max_priority_fee_per_gas: max_priority_fee_per_gas
                        .checked_add(self.priority_bump)
                        .ok_or_else(overflow)?,
                    max_fee_per_gas: max_fee_per_gas
                        .checked_add(max_fee_bump)
                        .ok_or_else(overflow)?,
                })
            }
            FeeParams::Legacy { gas_price } => Ok(FeeParams::Legacy {
                gas_price: gas_price
                    .checked_add(self.legacy_bump)
                    .ok_or_else(overflow)?,
            }),
        }
    }
}

/// Reacts to a matched pending transaction.
#[async_trait]
pub trait MatchHandler: Send + Sync {
    /// Never fails: every way a race can end is a report.
    async fn handle(&self, target: PendingTransaction) -> RaceReport;
}

/// Copies a target's call with higher fees, waits for inclusion and asks the
/// probe who actually won.
pub struct CompetitiveBidder {
    client: Arc<dyn ChainClient>,
    probe: Arc<dyn OutcomeProbe>,
    own: Address,
    contract: Address,
    policy: BidPolicy,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl CompetitiveBidder {
    pub fn new(
        client: Arc<dyn ChainClient>,
        probe: Arc<dyn OutcomeProbe>,
        own: Address,
        contract: Address,
        policy: BidPolicy,
    ) -> Self {
        Self {
            client,
            probe,
            own,
            contract,
            policy,
            receipt_poll_interval: Duration::from_millis(250),
            receipt_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_receipt_timing(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.receipt_poll_interval = poll_interval;
        self.receipt_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &BidPolicy {
        &self.policy
    }

    /// Run one race against `target`.
    pub async fn race(&self, target: &PendingTransaction) -> RaceReport {
        let started = Instant::now();
        let mut report = RaceReport::new(target.hash);

        let outcome = self.try_race(target, &mut report).await;
        report.outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Race against {} failed: {}", target.hash, e);
                RaceOutcome::Errored {
                    reason: e.to_string(),
                }
            }
        };
        report.elapsed = started.elapsed();

        tracing::info!(
            "Race against {} finished in {:?}: {}",
            target.hash,
            report.elapsed,
            report.outcome
        );
        report
    }

    async fn try_race(
        &self,
        target: &PendingTransaction,
        report: &mut RaceReport,
    ) -> Result<RaceOutcome> {
        let Some(target_fees) = target.fees else {
            return Ok(RaceOutcome::Skipped {
                reason: "target has no fee fields".to_string(),
            });
        };
        let fees = self.policy.outbid(&target_fees)?;
        report.fees = Some(fees);

        tracing::info!(
            "Outbidding {} from {}: tip {} -> {} gwei",
            target.hash,
            target.from.short(),
            format_gwei(target_fees.priority()),
            format_gwei(fees.priority())
        );

        let expectation = self.probe.expect().await?;

        let request = TxRequest {
            from: self.own,
            to: self.contract,
            input: target.input.clone(),
            value: target.value,
            gas_limit: self.policy.gas_limit,
            fees,
        };
        let hash = self.client.send_transaction(&request).await?;
        report.our_tx = Some(hash);
        tracing::info!("Sent {} racing {}", hash, target.hash);

        let receipt = wait_for_receipt(
            self.client.as_ref(),
            hash,
            self.receipt_poll_interval,
            self.receipt_timeout,
        )
        .await?;
        report.block_number = Some(receipt.block_number);

        if !receipt.success {
            return Ok(RaceOutcome::Lost {
                reason: format!("our transaction reverted in block {}", receipt.block_number),
            });
        }

        match self.probe.verify(&expectation, &self.own).await? {
            Verdict::Won => Ok(RaceOutcome::Won),
            Verdict::Lost { holder } => Ok(RaceOutcome::Lost {
                reason: match holder {
                    Some(holder) => format!("prize went to {}", holder),
                    None => "prize not ours".to_string(),
                },
            }),
        }
    }
}

#[async_trait]
impl MatchHandler for CompetitiveBidder {
    async fn handle(&self, target: PendingTransaction) -> RaceReport {
        self.race(&target).await
    }
}
