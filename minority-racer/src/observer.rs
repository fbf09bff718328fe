//! Mempool observer.
//!
//! Two feeds produce candidate transactions: a node-side pending filter
//! drained into a channel (push) or successive pending-block snapshots (poll).
//! Both run the same seen-set and target filter, and hand matches to a
//! `MatchHandler` on a spawned task so a slow race never stalls the feed.

use crate::bidder::MatchHandler;
use crate::config::{FeedMode, RacerConfig};
use crate::filter::TargetFilter;
use crate::seen::SeenSet;
use crate::telemetry::RaceReport;
use crate::Result;
use minority_core::{ChainClient, MinorityError, PendingTransaction, TxHash};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    Shutdown,
    Timeout,
    /// A race was won and the config asked to stop there.
    Won,
    FeedClosed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObserverStats {
    pub ticks: u64,
    /// Candidate transactions taken off the feed.
    pub observed: u64,
    pub matched: u64,
    /// Hashes the node no longer knew by the time we asked.
    pub missing: u64,
    pub transient_errors: u64,
    pub stop: StopReason,
}

pub struct MempoolObserver {
    client: Arc<dyn ChainClient>,
    handler: Arc<dyn MatchHandler>,
    reports: mpsc::Sender<RaceReport>,
    filter: TargetFilter,
    config: RacerConfig,
    won: Arc<Notify>,
}

impl MempoolObserver {
    pub fn new(
        client: Arc<dyn ChainClient>,
        handler: Arc<dyn MatchHandler>,
        reports: mpsc::Sender<RaceReport>,
        config: RacerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let filter = TargetFilter::for_signature(
            config.contract,
            &config.function_signature,
            config.own_address,
        );

        Ok(Self {
            client,
            handler,
            reports,
            filter,
            config,
            won: Arc::new(Notify::new()),
        })
    }

    pub fn filter(&self) -> &TargetFilter {
        &self.filter
    }

    /// Watch until `shutdown` flips (or its sender is dropped), the run
    /// timeout passes, or a won race ends the run.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> ObserverStats {
        let deadline = self.config.run_timeout.map(|t| Instant::now() + t);

        tracing::info!(
            "Watching {} for {} ({} mode) as {}",
            self.filter.contract,
            self.config.function_signature,
            self.config.mode,
            self.filter.own
        );

        let stats = match self.config.mode {
            FeedMode::Push => self.run_push(shutdown, deadline).await,
            FeedMode::Poll => self.run_poll(shutdown, deadline).await,
        };

        tracing::info!(
            "Observer stopped ({:?}): {} observed, {} matched, {} missing, {} transient errors",
            stats.stop,
            stats.observed,
            stats.matched,
            stats.missing,
            stats.transient_errors
        );
        stats
    }

    async fn run_poll(
        &self,
        mut shutdown: watch::Receiver<bool>,
        deadline: Option<Instant>,
    ) -> ObserverStats {
        let mut stats = ObserverStats::default();
        let mut seen = SeenSet::new(self.config.seen_capacity, self.config.seen_retain);
        let mut previous: HashSet<TxHash> = HashSet::new();

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    stats.stop = StopReason::Shutdown;
                    break;
                }
                _ = expire(deadline) => {
                    stats.stop = StopReason::Timeout;
                    break;
                }
                _ = self.won.notified() => {
                    stats.stop = StopReason::Won;
                    break;
                }
            }

            stats.ticks += 1;
            if stats.ticks % self.config.heartbeat_every as u64 == 0 {
                self.heartbeat(&seen).await;
            }

            let snapshot = match self.client.pending_transactions().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    stats.transient_errors += 1;
                    tracing::warn!("Pending snapshot failed, continuing: {}", e);
                    continue;
                }
            };

            let arrivals = new_arrivals(&previous, &snapshot);
            if !arrivals.is_empty() {
                tracing::debug!("{} new pending transactions", arrivals.len());
            }

            for tx in arrivals {
                stats.observed += 1;
                if !seen.insert(tx.hash) {
                    continue;
                }
                if self.filter.matches(tx) {
                    stats.matched += 1;
                    self.dispatch(tx.clone());
                }
            }

            previous = snapshot.iter().map(|tx| tx.hash).collect();
        }

        stats
    }

    async fn run_push(
        &self,
        mut shutdown: watch::Receiver<bool>,
        deadline: Option<Instant>,
    ) -> ObserverStats {
        let mut stats = ObserverStats::default();
        let mut seen = SeenSet::new(self.config.seen_capacity, self.config.seen_retain);

        let (tx, mut rx) = mpsc::channel(self.config.feed_buffer);
        let producer = spawn_pending_feed(
            self.client.clone(),
            self.config.filter_poll_interval,
            tx,
            shutdown.clone(),
        );

        let mut heartbeat =
            interval(self.config.poll_interval * self.config.heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let hash = tokio::select! {
                next = rx.recv() => match next {
                    Some(hash) => hash,
                    None => {
                        stats.stop = StopReason::FeedClosed;
                        break;
                    }
                },
                _ = heartbeat.tick() => {
                    stats.ticks += 1;
                    self.heartbeat(&seen).await;
                    continue;
                }
                _ = shutdown.changed() => {
                    stats.stop = StopReason::Shutdown;
                    break;
                }
                _ = expire(deadline) => {
                    stats.stop = StopReason::Timeout;
                    break;
                }
                _ = self.won.notified() => {
                    stats.stop = StopReason::Won;
                    break;
                }
            };

            stats.observed += 1;
            if !seen.insert(hash) {
                continue;
            }

            match self.client.transaction_by_hash(hash).await {
                Ok(Some(tx)) => {
                    if self.filter.matches(&tx) {
                        stats.matched += 1;
                        self.dispatch(tx);
                    }
                }
                Ok(None) => {
                    stats.missing += 1;
                    tracing::debug!("{} left the mempool before it could be read", hash);
                }
                Err(e) => {
                    stats.transient_errors += 1;
                    tracing::warn!("Fetching {} failed, continuing: {}", hash, e);
                }
            }
        }

        producer.abort();
        stats
    }

    /// Race `target` on its own task. The result reaches telemetry through
    /// the report channel.
    fn dispatch(&self, target: PendingTransaction) {
        tracing::info!(
            "Target {} from {} (nonce {})",
            target.hash,
            target.from.short(),
            target.nonce
        );

        let handler = self.handler.clone();
        let reports = self.reports.clone();
        let won = self.won.clone();
        let stop_on_win = self.config.stop_after_first_win;

        tokio::spawn(async move {
            let report = handler.handle(target).await;
            if stop_on_win && report.outcome.is_won() {
                won.notify_one();
            }
            if reports.send(report).await.is_err() {
                tracing::warn!("Telemetry collector is gone, dropping race report");
            }
        });
    }

    async fn heartbeat(&self, seen: &SeenSet) {
        match self.client.block_number().await {
            Ok(block) => tracing::info!("Heartbeat: block {}, {} transactions seen", block, seen.len()),
            Err(e) => tracing::debug!("Heartbeat block lookup failed: {}", e),
        }
    }
}

/// Transactions in `current` whose hash was not in the previous snapshot.
pub fn new_arrivals<'a>(
    previous: &HashSet<TxHash>,
    current: &'a [PendingTransaction],
) -> Vec<&'a PendingTransaction> {
    current
        .iter()
        .filter(|tx| !previous.contains(&tx.hash))
        .collect()
}

/// Drain a node-side pending filter into `tx` until shut down or the
/// receiver goes away. A filter the node forgot is reinstalled.
pub fn spawn_pending_feed(
    client: Arc<dyn ChainClient>,
    every: Duration,
    tx: mpsc::Sender<TxHash>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut filter_id: Option<String> = None;
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let id = match &filter_id {
                Some(id) => id.clone(),
                None => match client.new_pending_filter().await {
                    Ok(id) => {
                        tracing::info!("Installed pending transaction filter {}", id);
                        filter_id = Some(id.clone());
                        id
                    }
                    Err(e) => {
                        tracing::warn!("Installing pending filter failed, retrying: {}", e);
                        continue;
                    }
                },
            };

            match client.filter_changes(&id).await {
                Ok(hashes) => {
                    for hash in hashes {
                        if tx.send(hash).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) if is_filter_gone(&e) => {
                    tracing::warn!("Node dropped filter {}, reinstalling", id);
                    filter_id = None;
                }
                Err(e) => tracing::warn!("Reading filter {} failed, continuing: {}", id, e),
            }
        }
    })
}

fn is_filter_gone(e: &MinorityError) -> bool {
    matches!(e, MinorityError::Rpc { message, .. } if message.to_lowercase().contains("filter not found"))
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidder::{BidPolicy, CompetitiveBidder};
    use crate::mock::MockChain;
    use crate::probe::NextTokenOwnerProbe;
    use crate::telemetry::{RaceOutcome, RaceTelemetry};
    use async_trait::async_trait;
    use minority_core::{Address, H256};
    use parking_lot::Mutex;

    const ME: Address = Address([0xb0; 20]);
    const VICTIM: Address = Address([0xaa; 20]);

    #[derive(Default)]
    struct Recorder {
        targets: Mutex<Vec<TxHash>>,
    }

    #[async_trait]
    impl MatchHandler for Recorder {
        async fn handle(&self, target: PendingTransaction) -> RaceReport {
            self.targets.lock().push(target.hash);
            let mut report = RaceReport::new(target.hash);
            report.outcome = RaceOutcome::Won;
            report
        }
    }

    fn config(mode: FeedMode) -> RacerConfig {
        RacerConfig {
            contract: MockChain::contract(),
            own_address: ME,
            mode,
            poll_interval: Duration::from_millis(5),
            filter_poll_interval: Duration::from_millis(5),
            heartbeat_every: 3,
            run_timeout: Some(Duration::from_millis(200)),
            ..RacerConfig::default()
        }
    }

    async fn run_to_end(
        chain: Arc<MockChain>,
        handler: Arc<dyn MatchHandler>,
        config: RacerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> (ObserverStats, Arc<RaceTelemetry>) {
        let telemetry = Arc::new(RaceTelemetry::new());
        let (tx, rx) = mpsc::channel(16);
        let collector = RaceTelemetry::spawn_collector(telemetry.clone(), rx);

        let observer = MempoolObserver::new(chain, handler, tx, config).unwrap();
        let stats = observer.run(shutdown).await;
        drop(observer);
        collector.await.unwrap();
        (stats, telemetry)
    }

    #[test]
    fn test_new_arrivals_is_a_set_difference() {
        let a = MockChain::mint_tx(1, VICTIM);
        let b = MockChain::mint_tx(2, VICTIM);
        let c = MockChain::mint_tx(3, VICTIM);
        let previous: HashSet<TxHash> = [a.hash, b.hash].into_iter().collect();

        let current = vec![b.clone(), c.clone()];
        let arrivals = new_arrivals(&previous, &current);
        assert_eq!(arrivals, vec![&c]);
    }

    #[tokio::test]
    async fn test_poll_dispatches_each_match_once() {
        let chain = Arc::new(MockChain::default());
        {
            let mut state = chain.state.lock();
            let mut elsewhere = MockChain::mint_tx(3, VICTIM);
            elsewhere.to = Some(Address([0x01; 20]));
            state.pending = vec![
                MockChain::mint_tx(1, VICTIM),
                MockChain::mint_tx(2, ME),
                elsewhere,
            ];
            state.failing_polls = 2;
        }
        let recorder = Arc::new(Recorder::default());
        let (_keep, shutdown) = watch::channel(false);

        let (stats, telemetry) =
            run_to_end(chain, recorder.clone(), config(FeedMode::Poll), shutdown).await;

        assert_eq!(stats.stop, StopReason::Timeout);
        assert_eq!(stats.transient_errors, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.observed, 3);
        assert_eq!(*recorder.targets.lock(), vec![H256([1; 32])]);
        assert_eq!(telemetry.snapshot().won, 1);
    }

    #[tokio::test]
    async fn test_poll_stops_on_shutdown() {
        let chain = Arc::new(MockChain::default());
        let (stop, shutdown) = watch::channel(false);
        let mut config = config(FeedMode::Poll);
        config.run_timeout = None;

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = stop.send(true);
        });

        let (stats, _) = run_to_end(chain, Arc::new(Recorder::default()), config, shutdown).await;
        assert_eq!(stats.stop, StopReason::Shutdown);
        assert!(stats.ticks > 0);
    }

    #[tokio::test]
    async fn test_push_ignores_vanished_and_repeated_hashes() {
        let chain = Arc::new(MockChain::default());
        let victim = MockChain::mint_tx(1, VICTIM);
        {
            let mut state = chain.state.lock();
            state.known.insert(victim.hash, victim.clone());
            state.feed.push_back(vec![H256([0x77; 32]), victim.hash]);
            state.feed.push_back(vec![victim.hash]);
        }
        let recorder = Arc::new(Recorder::default());
        let (_keep, shutdown) = watch::channel(false);

        let (stats, telemetry) =
            run_to_end(chain.clone(), recorder.clone(), config(FeedMode::Push), shutdown).await;

        assert_eq!(stats.stop, StopReason::Timeout);
        assert_eq!(stats.observed, 3);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.matched, 1);
        assert_eq!(*recorder.targets.lock(), vec![victim.hash]);
        assert_eq!(telemetry.snapshot().won, 1);
        assert_eq!(chain.state.lock().filters_installed, 1);
    }

    #[tokio::test]
    async fn test_push_recovers_from_filter_errors() {
        let chain = Arc::new(MockChain::default());
        let victim = MockChain::mint_tx(1, VICTIM);
        {
            let mut state = chain.state.lock();
            state.known.insert(victim.hash, victim.clone());
            state.failing_installs = 1;
            state.filter_read_errors.push_back("filter not found");
            state.filter_read_errors.push_back("header not found");
            state.feed.push_back(vec![victim.hash]);
        }
        let recorder = Arc::new(Recorder::default());
        let (_keep, shutdown) = watch::channel(false);

        let (stats, _) =
            run_to_end(chain.clone(), recorder.clone(), config(FeedMode::Push), shutdown).await;

        assert_eq!(stats.stop, StopReason::Timeout);
        assert_eq!(stats.matched, 1);
        assert_eq!(*recorder.targets.lock(), vec![victim.hash]);

        let state = chain.state.lock();
        // only the forgotten filter is reinstalled; other read errors keep it
        assert_eq!(state.filters_installed, 2);
        assert!(state.filter_read_errors.is_empty());
        assert!(state.feed.is_empty());
    }

    #[test]
    fn test_filter_gone_detection() {
        assert!(is_filter_gone(&MinorityError::rpc(-32000, "Filter not found")));
        assert!(!is_filter_gone(&MinorityError::rpc(-32000, "header not found")));
        assert!(!is_filter_gone(&MinorityError::timeout("filter not found")));
    }

    #[tokio::test]
    async fn test_stops_after_first_win() {
        let chain = Arc::new(MockChain::default());
        chain.state.lock().pending = vec![MockChain::mint_tx(1, VICTIM)];

        let probe = Arc::new(NextTokenOwnerProbe::new(chain.clone(), MockChain::contract()));
        let bidder = Arc::new(
            CompetitiveBidder::new(chain.clone(), probe, ME, MockChain::contract(), BidPolicy::default())
                .with_receipt_timing(Duration::from_millis(1), Duration::from_secs(1)),
        );

        let mut config = config(FeedMode::Poll);
        config.run_timeout = Some(Duration::from_secs(10));
        config.stop_after_first_win = true;
        let (_keep, shutdown) = watch::channel(false);

        let (stats, telemetry) = run_to_end(chain.clone(), bidder, config, shutdown).await;

        assert_eq!(stats.stop, StopReason::Won);
        assert_eq!(telemetry.snapshot().won, 1);
        assert_eq!(chain.state.lock().owners.get(&1), Some(&ME));
    }
}
