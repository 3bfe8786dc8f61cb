//! Logging module for the procurement relay
//!
//! Structured logging via `tracing`: JSON lines in production, pretty
//! output everywhere else.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Default filter when `RUST_LOG` is not set
pub fn default_filter(log_level: &str) -> String {
    format!(
        "procurement_relay={level},tower_http=debug,rdkafka=warn",
        level = log_level
    )
}

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over the configured log level.
pub fn init_tracing(config: &ServerConfig) -> Result<()> {
    let log_level = config.log_level.as_str();
    let environment = config.environment.as_str();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    let init = if config.is_production() {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true);
        Registry::default().with(env_filter).with(layer).try_init()
    } else {
        let layer = fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        Registry::default().with(env_filter).with(layer).try_init()
    };

    init.map_err(|e| Error::internal(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!(environment, log_level, "Logging initialized");
    Ok(())
}

/// Span covering one relay cycle
#[macro_export]
macro_rules! cycle_span {
    ($cycle:expr) => {
        tracing::info_span!(
            "relay_cycle",
            cycle = $cycle,
            drained = tracing::field::Empty,
            routed = tracing::field::Empty,
            stopped_at = tracing::field::Empty,
        )
    };
}

/// Span covering work against one broker destination
#[macro_export]
macro_rules! broker_span {
    ($destination:expr) => {
        tracing::debug_span!("broker", destination = %$destination)
    };
}

/// Log an error with its display and debug forms
#[macro_export]
macro_rules! log_error {
    ($error:expr, $msg:expr) => {
        tracing::error!(error = %$error, error_type = ?$error, $msg)
    };
    ($error:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::error!(
            error = %$error,
            error_type = ?$error,
            $($key = tracing::field::display(&$value),)*
            $msg
        )
    };
}

/// Measures one stage of work
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Timer {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// Stop the timer, logging the duration at debug level
    pub fn stop(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}
