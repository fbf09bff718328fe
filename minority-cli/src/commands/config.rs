use crate::config::CliConfig;
use anyhow::{bail, Result};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective config
    Show,
    /// Write the default config file into the data directory
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_config_command(
    cmd: ConfigCommands,
    data_dir: &Path,
    config: &CliConfig,
) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("# {}", CliConfig::path(data_dir).display());
            println!("{}", serde_json::to_string_pretty(config)?);
        }

        ConfigCommands::Init { force } => {
            let path = CliConfig::path(data_dir);
            if tokio::fs::try_exists(&path).await? && !force {
                bail!("{} already exists, pass --force to overwrite", path.display());
            }
            let path = CliConfig::default().save(data_dir).await?;
            println!("Wrote default config to {}", path.display());
            println!("Set racer.own_address before running the racer.");
        }
    }

    Ok(())
}
