//! Configuration module for the procurement relay
//!
//! Every section is loaded from environment variables (a local `.env` file
//! is read first when present) and nested into one [`Config`].

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::broker::BrokerConfig;
use crate::error::{Error, Result};
use crate::models::order::validate_library_id;
use crate::models::Category;
use crate::procurement::ProcurementConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, Envconfig)]
pub struct Config {
    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub server: ServerConfig,

    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub broker: BrokerConfig,

    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub procurement: ProcurementConfig,

    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub scheduler: SchedulerConfig,

    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub library: LibraryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct ServerConfig {
    /// Host to bind to
    #[envconfig(from = "HOST", default = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[envconfig(from = "ENVIRONMENT", default = "development")]
    pub environment: String,

    #[envconfig(from = "REQUEST_TIMEOUT_SECS", default = "30")]
    pub request_timeout_secs: u64,

    /// Upper bound on draining in-flight work at shutdown
    #[envconfig(from = "SHUTDOWN_TIMEOUT_SECS", default = "30")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Get the server address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Relay cycle timing
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct SchedulerConfig {
    /// Seconds between relay cycles
    #[envconfig(from = "CYCLE_PERIOD_SECS", default = "300")]
    pub cycle_period_secs: u64,

    /// Run the first cycle immediately instead of after one period
    #[envconfig(from = "RUN_ON_STARTUP", default = "true")]
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_period_secs: 300,
            run_on_startup: true,
        }
    }
}

impl SchedulerConfig {
    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(self.cycle_period_secs)
    }
}

/// Identity of this library and the categories it stocks
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct LibraryConfig {
    /// Library id carried in every order
    #[envconfig(from = "LIBRARY_ID", default = "79417")]
    pub library_id: String,

    /// Comma-separated categories to receive arrivals for; empty disables
    #[envconfig(
        from = "LIBRARY_SUBSCRIBED_CATEGORIES",
        default = "computer,management,comics,selfimprovement"
    )]
    pub subscribed_categories: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_id: "79417".to_string(),
            subscribed_categories: "computer,management,comics,selfimprovement".to_string(),
        }
    }
}

impl LibraryConfig {
    /// Parse the subscribed categories
    pub fn categories(&self) -> Result<Vec<Category>> {
        self.subscribed_categories
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                Category::parse(name)
                    .ok_or_else(|| Error::config(format!("Unknown category: {}", name)))
            })
            .collect()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        Config::init_from_env().map_err(Error::from)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::config("Server port cannot be 0"));
        }

        if self.broker.bootstrap_servers.trim().is_empty() {
            return Err(Error::config("Broker bootstrap servers cannot be empty"));
        }

        if self.broker.orders_queue.trim().is_empty() {
            return Err(Error::config("Orders queue name cannot be empty"));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(Error::config("Request timeout must be positive"));
        }

        if self.broker.idle_receive_timeout_ms == 0 {
            return Err(Error::config("Idle receive timeout must be positive"));
        }

        if self.broker.send_timeout_ms == 0 {
            return Err(Error::config("Broker send timeout must be positive"));
        }

        if self.procurement.timeout_secs == 0 || self.procurement.connect_timeout_secs == 0 {
            return Err(Error::config("Procurement timeouts must be positive"));
        }

        let base_url = &self.procurement.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "Procurement base URL must be http(s): {}",
                base_url
            )));
        }

        if self.scheduler.cycle_period_secs == 0 {
            return Err(Error::config("Cycle period must be at least 1 second"));
        }

        validate_library_id(&self.library.library_id)
            .map_err(|e| Error::config(format!("Invalid LIBRARY_ID: {}", e)))?;

        self.library.categories()?;

        Ok(())
    }

    /// Log configuration (with secrets masked)
    pub fn log_config(&self) {
        tracing::info!(
            server_address = %self.server.address(),
            environment = %self.server.environment,
            log_level = %self.server.log_level,
            "Server configuration"
        );

        tracing::info!(
            bootstrap_servers = %self.broker.bootstrap_servers,
            user = %self.broker.user,
            password = if self.broker.password.is_empty() { "" } else { "***" },
            orders_queue = %self.broker.orders_queue,
            topic_prefix = %self.broker.topic_prefix,
            "Broker configuration"
        );

        tracing::info!(
            base_url = %self.procurement.base_url,
            timeout_secs = self.procurement.timeout_secs,
            heartbeat_url = %self.procurement.heartbeat_url,
            "Procurement configuration"
        );

        tracing::info!(
            cycle_period_secs = self.scheduler.cycle_period_secs,
            run_on_startup = self.scheduler.run_on_startup,
            library_id = %self.library.library_id,
            subscribed_categories = %self.library.subscribed_categories,
            "Relay configuration"
        );
    }
}
