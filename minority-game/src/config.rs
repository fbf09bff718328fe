use crate::{GameError, Result};
use minority_core::MinorityError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Used when a round is created with a zero commit duration.
    pub default_commit_duration: Duration,
    /// Used when a round is created with a zero reveal duration.
    pub default_reveal_duration: Duration,
    pub min_options: usize,
    pub max_options: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_commit_duration: Duration::from_secs(3600), // 1 hour
            default_reveal_duration: Duration::from_secs(1800), // 30 minutes
            min_options: 2,
            max_options: 10,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_options < 2 {
            return Err(config_error("A round needs at least 2 options"));
        }

        if self.max_options < self.min_options {
            return Err(config_error("max_options must be >= min_options"));
        }

        if self.default_commit_duration.is_zero() || self.default_reveal_duration.is_zero() {
            return Err(config_error("Default phase durations must be greater than 0"));
        }

        Ok(())
    }

    /// Zero means "use the default", as the contract does.
    pub fn commit_secs(&self, requested: Duration) -> u64 {
        if requested.is_zero() {
            self.default_commit_duration.as_secs()
        } else {
            requested.as_secs()
        }
    }

    pub fn reveal_secs(&self, requested: Duration) -> u64 {
        if requested.is_zero() {
            self.default_reveal_duration.as_secs()
        } else {
            requested.as_secs()
        }
    }
}

fn config_error(msg: &str) -> GameError {
    GameError::Core(MinorityError::config(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        config.validate().unwrap();
        assert_eq!(config.commit_secs(Duration::ZERO), 3600);
        assert_eq!(config.reveal_secs(Duration::ZERO), 1800);
        assert_eq!(config.commit_secs(Duration::from_secs(60)), 60);
    }

    #[test]
    fn test_rejects_bad_bounds() {
        let mut config = GameConfig::default();
        config.max_options = 1;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.min_options = 1;
        assert!(config.validate().is_err());
    }
}
