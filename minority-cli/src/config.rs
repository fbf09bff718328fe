use anyhow::{Context, Result};
use minority_core::NodeConfig;
use minority_game::GameConfig;
use minority_racer::RacerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Everything the `minority` binary can be configured with, stored as
/// `config.json` in the data directory. Command-line flags win over it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub node: NodeConfig,
    pub game: GameConfig,
    pub racer: RacerConfig,
}

impl CliConfig {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Read the config, falling back to defaults when the file is absent.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;

        config.node.validate()?;
        config.game.validate()?;
        Ok(config)
    }

    pub async fn save(&self, data_dir: &Path) -> Result<PathBuf> {
        let path = Self::path(data_dir);
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, raw)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("minority")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.node.rpc_url, "http://127.0.0.1:8545");

        let mut changed = config.clone();
        changed.node.rpc_url = "http://10.0.0.2:8545".to_string();
        changed.save(dir.path()).await.unwrap();

        let loaded = CliConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded.node.rpc_url, "http://10.0.0.2:8545");
        assert_eq!(loaded.racer.seen_capacity, 1000);
    }

    #[tokio::test]
    async fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            CliConfig::path(dir.path()),
            r#"{"game": {"default_commit_duration": {"secs": 60, "nanos": 0},
                         "default_reveal_duration": {"secs": 30, "nanos": 0},
                         "min_options": 2, "max_options": 4}}"#,
        )
        .await
        .unwrap();

        let config = CliConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.game.max_options, 4);
        assert_eq!(config.node.rpc_url, "http://127.0.0.1:8545");
    }
}
