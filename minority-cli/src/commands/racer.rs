use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use minority_core::{ChainClient, JsonRpcClient};
use minority_racer::{
    CompetitiveBidder, FeedMode, MempoolObserver, NextTokenOwnerProbe, RaceTelemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Subcommand)]
pub enum RacerCommands {
    /// Watch the mempool and race every matching call
    Run {
        /// push (node filter) or poll (pending-block diff)
        #[arg(long)]
        mode: Option<FeedMode>,
        /// Contract to watch
        #[arg(long)]
        contract: Option<String>,
        /// Function signature to race, e.g. "mint()"
        #[arg(long)]
        signature: Option<String>,
        /// Our address; the node must be able to sign for it
        #[arg(long)]
        own: Option<String>,
        /// Stop after this many seconds (0 = run until Ctrl+C)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Stop once a race has been won
        #[arg(long)]
        stop_after_win: bool,
    },
}

pub async fn handle_racer_command(cmd: RacerCommands, config: &CliConfig) -> Result<()> {
    match cmd {
        RacerCommands::Run {
            mode,
            contract,
            signature,
            own,
            timeout_secs,
            stop_after_win,
        } => {
            let mut racer = config.racer.clone();
            if let Some(mode) = mode {
                racer.mode = mode;
            }
            if let Some(contract) = contract {
                racer.contract = contract.parse()?;
            }
            if let Some(signature) = signature {
                racer.function_signature = signature;
            }
            if let Some(own) = own {
                racer.own_address = own.parse()?;
            }
            if let Some(secs) = timeout_secs {
                racer.run_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            racer.stop_after_first_win |= stop_after_win;
            racer
                .validate()
                .context("racer config is incomplete, pass --own or set racer.own_address")?;

            let client: Arc<dyn ChainClient> = Arc::new(JsonRpcClient::new(&config.node)?);
            let block = client
                .block_number()
                .await
                .with_context(|| format!("node at {} is unreachable", config.node.rpc_url))?;

            let probe = Arc::new(NextTokenOwnerProbe::new(client.clone(), racer.contract));
            let bidder = CompetitiveBidder::new(
                client.clone(),
                probe,
                racer.own_address,
                racer.contract,
                racer.bid.clone(),
            )
            .with_receipt_timing(config.node.receipt_poll_interval, config.node.receipt_timeout);

            let telemetry = Arc::new(RaceTelemetry::new());
            let (report_tx, report_rx) = mpsc::channel(racer.feed_buffer);
            let collector = RaceTelemetry::spawn_collector(telemetry.clone(), report_rx);

            let observer = MempoolObserver::new(client, Arc::new(bidder), report_tx, racer.clone())?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl+C received, stopping");
                    let _ = shutdown_tx.send(true);
                }
            });

            println!(
                "Racing {} on {} from {} ({} mode, node at block {})",
                racer.function_signature, racer.contract, racer.own_address, racer.mode, block
            );
            let stats = observer.run(shutdown_rx).await;

            // in-flight races still hold report senders
            drop(observer);
            if tokio::time::timeout(config.node.receipt_timeout, collector)
                .await
                .is_err()
            {
                tracing::warn!("Some races were still running at exit");
            }

            let snapshot = telemetry.snapshot();
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Metric", "Value"]);
            table.add_row(vec!["Stopped by".to_string(), format!("{:?}", stats.stop)]);
            table.add_row(vec!["Ticks".to_string(), stats.ticks.to_string()]);
            table.add_row(vec!["Observed".to_string(), stats.observed.to_string()]);
            table.add_row(vec!["Matched".to_string(), stats.matched.to_string()]);
            table.add_row(vec!["Vanished".to_string(), stats.missing.to_string()]);
            table.add_row(vec!["RPC errors".to_string(), stats.transient_errors.to_string()]);
            table.add_row(vec!["Won".to_string(), snapshot.won.to_string()]);
            table.add_row(vec!["Lost".to_string(), snapshot.lost.to_string()]);
            table.add_row(vec!["Skipped".to_string(), snapshot.skipped.to_string()]);
            table.add_row(vec!["Errored".to_string(), snapshot.errored.to_string()]);
            println!("{}", table);

            if !snapshot.recent_reasons.is_empty() {
                println!("Recent non-wins:");
                for reason in &snapshot.recent_reasons {
                    println!("  {}", reason);
                }
            }
        }
    }

    Ok(())
}
