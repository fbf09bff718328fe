mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use minority_game::GameError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minority")]
#[command(about = "Commit-reveal minority game and mempool racer")]
#[command(version)]
struct Cli {
    /// Data directory for the round database, vault and config
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON-RPC endpoint, overrides the config file
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Minority game rounds
    #[command(subcommand)]
    Round(commands::RoundCommands),

    /// Mempool racing bot
    #[command(subcommand)]
    Racer(commands::RacerCommands),

    /// Hashing and inspection helpers
    #[command(subcommand)]
    Util(commands::UtilCommands),

    /// Show or write the config file
    #[command(subcommand)]
    Config(commands::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "minority_cli={0},minority_core={0},minority_game={0},minority_racer={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(config::default_data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let mut config = CliConfig::load(&data_dir).await?;
    if let Some(url) = cli.rpc_url {
        config.node.rpc_url = url;
    }

    let result = match cli.command {
        Commands::Round(cmd) => commands::handle_round_command(cmd, &data_dir, &config).await,
        Commands::Racer(cmd) => commands::handle_racer_command(cmd, &config).await,
        Commands::Util(cmd) => commands::handle_util_command(cmd, &config).await,
        Commands::Config(cmd) => commands::handle_config_command(cmd, &data_dir, &config).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<GameError>() {
            Some(GameError::RoundNotFound(id)) => {
                eprintln!("Error: Round {} not found", id);
                eprintln!("Use 'minority round list' to see known rounds");
            }
            Some(GameError::MissingTicket(id)) => {
                eprintln!("Error: No sealed reveal ticket for round {}", id);
                eprintln!("Only participants who committed from this data directory can reveal here");
            }
            Some(game_error) => {
                eprintln!("Error [{}]: {}", game_error.code(), game_error);
            }
            None => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
