//! Procurement service configuration

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the procurement service lives and how long to wait for it
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct ProcurementConfig {
    /// Base URL; `/orders` is appended for submission and retrieval
    #[serde(default = "default_base_url")]
    #[envconfig(from = "PROCUREMENT_BASE_URL", default = "http://localhost:9000")]
    pub base_url: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[envconfig(from = "PROCUREMENT_TIMEOUT_SECS", default = "30")]
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    #[envconfig(from = "PROCUREMENT_CONNECT_TIMEOUT_SECS", default = "5")]
    pub connect_timeout_secs: u64,

    /// Liveness URL polled every tick; empty disables the heartbeat
    #[serde(default)]
    #[envconfig(from = "HEARTBEAT_URL", default = "")]
    pub heartbeat_url: String,
}

impl Default for ProcurementConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            heartbeat_url: String::new(),
        }
    }
}

impl ProcurementConfig {
    pub fn from_env() -> Result<Self, envconfig::Error> {
        <Self as envconfig::Envconfig>::init_from_env()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Heartbeat URL, if one is configured
    pub fn heartbeat_url(&self) -> Option<&str> {
        let url = self.heartbeat_url.trim();
        (!url.is_empty()).then_some(url)
    }
}

fn default_base_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcurementConfig::default();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_url(), None);
    }

    #[test]
    fn test_heartbeat_url_is_trimmed() {
        let config = ProcurementConfig {
            heartbeat_url: "  http://ip.jsontest.com/ ".to_string(),
            ..ProcurementConfig::default()
        };
        assert_eq!(config.heartbeat_url(), Some("http://ip.jsontest.com/"));
    }
}
