//! Health check endpoints
//!
//! Liveness, readiness and build information. Readiness reports the
//! components recorded in [`HealthState`], the relay cycle among them.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::{ComponentHealth, HealthResponse, HealthStatus, ReadyResponse, BUILD_INFO};

/// Component health tracking
#[derive(Clone, Default)]
pub struct HealthState {
    pub components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current status of a component
    pub async fn update_component(
        &self,
        name: impl Into<String>,
        status: HealthStatus,
        message: Option<String>,
    ) {
        self.components.write().await.insert(
            name.into(),
            ComponentHealth {
                status,
                message,
                last_check: Utc::now(),
            },
        );
    }

    /// Last recorded health of one component
    pub async fn component(&self, name: &str) -> Option<ComponentHealth> {
        self.components.read().await.get(name).cloned()
    }

    /// Worst status across all components
    pub async fn get_status(&self) -> HealthStatus {
        let components = self.components.read().await;

        if components.values().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if components.values().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

/// `GET /healthz`: the process is up
pub async fn health_check() -> Response {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Service is running".to_string()),
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// `GET /readyz`: component checks, 503 when any is unhealthy
pub async fn ready_check(State(state): State<Arc<HealthState>>) -> Response {
    let checks = state.components.read().await.clone();
    let status = state.get_status().await;

    let response = ReadyResponse {
        status,
        checks,
        timestamp: Utc::now(),
    };

    (status.to_status_code(), Json(response)).into_response()
}

/// `GET /build`
pub async fn build_info() -> Response {
    (StatusCode::OK, Json(&BUILD_INFO)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_state() {
        let state = HealthState::new();
        assert_eq!(state.get_status().await, HealthStatus::Healthy);

        state.update_component("relay", HealthStatus::Degraded, None).await;
        assert_eq!(state.get_status().await, HealthStatus::Degraded);

        state
            .update_component(
                "broker",
                HealthStatus::Unhealthy,
                Some("Connection refused".to_string()),
            )
            .await;
        assert_eq!(state.get_status().await, HealthStatus::Unhealthy);

        let broker = state.component("broker").await.unwrap();
        assert_eq!(broker.message.as_deref(), Some("Connection refused"));
        assert!(state.component("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_health_check_endpoint() {
        let response = health_check().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_check_reflects_components() {
        let state = Arc::new(HealthState::new());
        state
            .update_component("relay", HealthStatus::Healthy, Some("drained=0".to_string()))
            .await;

        let response = ready_check(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        state.update_component("relay", HealthStatus::Unhealthy, None).await;
        let response = ready_check(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_build_info_endpoint() {
        let response = build_info().await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
