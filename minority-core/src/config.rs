use crate::error::{MinorityError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to reach the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub rpc_url: String,
    pub request_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // local Anvil / Hardhat node
            rpc_url: "http://127.0.0.1:8545".to_string(),
            request_timeout: Duration::from_secs(10),
            receipt_poll_interval: Duration::from_millis(250),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}

impl NodeConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(MinorityError::config("RPC URL cannot be empty"));
        }

        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(MinorityError::config(format!(
                "RPC URL must be http(s), got '{}'",
                self.rpc_url
            )));
        }

        if self.request_timeout.is_zero() || self.receipt_timeout.is_zero() {
            return Err(MinorityError::config("Timeouts must be greater than 0"));
        }

        if self.receipt_poll_interval.is_zero() {
            return Err(MinorityError::config(
                "Receipt poll interval must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        NodeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_ws_url() {
        assert!(NodeConfig::new("ws://127.0.0.1:8546").validate().is_err());
        assert!(NodeConfig::new("").validate().is_err());
    }
}
