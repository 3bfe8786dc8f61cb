//! API module for the procurement relay
//!
//! This module contains the HTTP endpoints and server setup: health and
//! build information, and the library book routes through which lost books
//! are reordered.

pub mod books;
pub mod health;
pub mod server;

pub use health::{build_info, health_check, ready_check, HealthState};
pub use server::{create_router, create_server, shutdown_signal};

use axum::extract::FromRef;
use std::sync::Arc;

use crate::broker::OrderEnqueuer;
use crate::catalog::BookCatalog;

/// API version constant
pub const API_VERSION: &str = "v1";

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn BookCatalog>,
    pub enqueuer: OrderEnqueuer,
    pub health: Arc<HealthState>,
    /// Library id placed on orders for lost books
    pub library_id: String,
}

impl FromRef<AppState> for Arc<HealthState> {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

/// Build information populated at compile time
pub const BUILD_INFO: BuildInfo = BuildInfo {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
    commit: match option_env!("GIT_COMMIT") {
        Some(commit) => commit,
        None => "unknown",
    },
};

/// Build information structure
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    /// Application version from Cargo.toml
    pub version: &'static str,
    /// Git commit hash, when provided at build time
    pub commit: &'static str,
}

/// Health check response
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Ready check response
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ReadyResponse {
    /// Overall readiness status
    pub status: HealthStatus,
    /// Individual component checks
    pub checks: std::collections::HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Component health status
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    /// Last report or error message
    pub message: Option<String>,
    pub last_check: chrono::DateTime<chrono::Utc>,
}

/// Health status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Operational, but the last relay cycle ended early
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Convert to HTTP status code
    pub fn to_status_code(&self) -> axum::http::StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => axum::http::StatusCode::OK,
            HealthStatus::Unhealthy => axum::http::StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded.is_healthy());

        assert_eq!(
            HealthStatus::Degraded.to_status_code(),
            axum::http::StatusCode::OK
        );
        assert_eq!(
            HealthStatus::Unhealthy.to_status_code(),
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_build_info() {
        assert_eq!(BUILD_INFO.name, "procurement-relay");
        assert!(!BUILD_INFO.version.is_empty());
        assert!(!BUILD_INFO.commit.is_empty());
    }
}
