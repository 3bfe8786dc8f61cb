//! Fixed-period driver of the relay job

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use super::{CycleReport, ProcurementJob};
use crate::api::health::HealthState;
use crate::api::HealthStatus;

/// Health component name of the relay
pub const RELAY_COMPONENT: &str = "relay";

/// Runs relay cycles one after another on a fixed period
pub struct Scheduler {
    job: Arc<ProcurementJob>,
    period: Duration,
    run_on_startup: bool,
    health: Option<Arc<HealthState>>,
    cycles: u64,
}

impl Scheduler {
    pub fn new(job: Arc<ProcurementJob>, period: Duration, run_on_startup: bool) -> Self {
        Self {
            job,
            period,
            run_on_startup,
            health: None,
            cycles: 0,
        }
    }

    /// Record each cycle's outcome as the `relay` health component
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Tick until shutdown is signalled
    ///
    /// Ticks missed while a cycle runs are skipped. A cycle already running
    /// when shutdown arrives is allowed to finish.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let first = if self.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + self.period
        };
        let mut ticker = interval_at(first, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_secs = self.period.as_secs(), "Relay scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            self.tick().await;
        }

        info!(cycles = self.cycles, "Relay scheduler stopped");
    }

    /// Fire the heartbeat and run one cycle to completion
    ///
    /// Returns `None` when the cycle panicked; the job is reset to idle.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        self.cycles += 1;
        let cycle = self.cycles;

        let heartbeat_job = self.job.clone();
        tokio::spawn(async move { heartbeat_job.heartbeat().await });

        let job = self.job.clone();
        let report = match tokio::spawn(async move { job.run_cycle(cycle).await }).await {
            Ok(report) => Some(report),
            Err(e) => {
                crate::log_error!(e, "Relay cycle panicked", cycle = cycle);
                self.job.reset();
                None
            },
        };

        if let Some(health) = &self.health {
            let (status, message) = match &report {
                Some(report) if report.is_clean() => (HealthStatus::Healthy, report.to_string()),
                Some(report) => (HealthStatus::Degraded, report.to_string()),
                None => (HealthStatus::Degraded, "cycle panicked".to_string()),
            };
            let was_degraded = health
                .component(RELAY_COMPONENT)
                .await
                .is_some_and(|previous| !previous.status.is_healthy());
            if was_degraded && status.is_healthy() {
                info!(cycle, "Relay recovered");
            }
            health
                .update_component(RELAY_COMPONENT.to_string(), status, Some(message))
                .await;
        }

        report
    }
}
