//! One relay cycle: drain, submit, fetch, route

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use super::{CategoryRouter, RouteOutcome};
use crate::broker::QueueDrainer;
use crate::error::Result;
use crate::logging::Timer;
use crate::models::OrderBatch;
use crate::procurement::{ProcurementGateway, RecordOutcome, SkipReason, SubmitOutcome};

/// Stage of the relay state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    #[default]
    Idle,
    Draining,
    Submitting,
    Fetching,
    Routing,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Draining => "draining",
            CycleState::Submitting => "submitting",
            CycleState::Fetching => "fetching",
            CycleState::Routing => "routing",
        };
        f.write_str(name)
    }
}

/// Summary of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub drained: usize,
    pub submitted: bool,
    pub parsed: usize,
    pub skipped: usize,
    pub routed: usize,
    pub unrouted: usize,
    pub failed: usize,
    /// Last state entered before the cycle returned to idle
    pub stopped_at: CycleState,
    pub elapsed_ms: u64,
    /// Error that ended the cycle early
    pub error: Option<String>,
}

impl CycleReport {
    /// Whether the cycle ran without an aborting error
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "drained={} submitted={} parsed={} skipped={} routed={} unrouted={} failed={} stopped_at={}",
            self.drained,
            self.submitted,
            self.parsed,
            self.skipped,
            self.routed,
            self.unrouted,
            self.failed,
            self.stopped_at
        )?;
        if let Some(error) = &self.error {
            write!(f, " error=\"{}\"", error)?;
        }
        Ok(())
    }
}

/// Settings of a relay job
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub library_id: String,
    pub orders_queue: String,
    pub idle_timeout: Duration,
}

/// The periodic procurement job
pub struct ProcurementJob {
    drainer: QueueDrainer,
    gateway: Arc<dyn ProcurementGateway>,
    router: CategoryRouter,
    settings: JobSettings,
    state: watch::Sender<CycleState>,
}

impl ProcurementJob {
    pub fn new(
        drainer: QueueDrainer,
        gateway: Arc<dyn ProcurementGateway>,
        router: CategoryRouter,
        settings: JobSettings,
    ) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            drainer,
            gateway,
            router,
            settings,
            state,
        }
    }

    /// Current state
    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    /// Force the state machine back to idle
    pub fn reset(&self) {
        self.enter(CycleState::Idle);
    }

    fn enter(&self, state: CycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Relay state changed");
        }
    }

    /// Run one cycle and return to idle
    ///
    /// Errors end the cycle early and are recorded in the report; they never
    /// escape.
    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let span = crate::cycle_span!(cycle);
        let timer = Timer::start("relay_cycle");
        let mut report = CycleReport::default();

        if let Err(e) = self.advance(&mut report).instrument(span.clone()).await {
            if e.aborts_cycle() {
                error!(cycle, state = %self.state(), error = %e, "Relay cycle aborted");
            } else {
                warn!(cycle, state = %self.state(), error = %e, "Relay cycle ended early");
            }
            report.error = Some(e.to_string());
        }

        report.stopped_at = self.state();
        report.elapsed_ms = timer.stop().as_millis() as u64;
        self.reset();

        span.record("drained", report.drained);
        span.record("routed", report.routed);
        span.record("stopped_at", tracing::field::display(report.stopped_at));
        info!(cycle, report = %report, "Relay cycle finished");

        report
    }

    async fn advance(&self, report: &mut CycleReport) -> Result<()> {
        self.enter(CycleState::Draining);
        let isbns = self
            .drainer
            .drain(&self.settings.orders_queue, self.settings.idle_timeout)
            .await;
        report.drained = isbns.len();

        let batch = OrderBatch::new(self.settings.library_id.clone(), isbns);
        if batch.is_empty() {
            info!("No pending orders");
            return Ok(());
        }

        self.enter(CycleState::Submitting);
        match self.gateway.submit(&batch).await? {
            SubmitOutcome::Submitted => report.submitted = true,
            SubmitOutcome::SkippedEmpty => return Ok(()),
        }

        self.enter(CycleState::Fetching);
        let outcomes = self.gateway.fetch_records(&self.settings.library_id).await?;

        self.enter(CycleState::Routing);
        for outcome in outcomes {
            let record = match outcome {
                RecordOutcome::Parsed(record) => record,
                RecordOutcome::Skipped(SkipReason::MissingIsbn) => {
                    debug!("Record without isbn dropped");
                    report.skipped += 1;
                    continue;
                },
                RecordOutcome::Skipped(SkipReason::Malformed(reason)) => {
                    warn!(reason = %reason, "Malformed record skipped");
                    report.skipped += 1;
                    continue;
                },
            };

            report.parsed += 1;
            match self.router.route(&record).await {
                RouteOutcome::Published(_) => report.routed += 1,
                RouteOutcome::Unrouted => report.unrouted += 1,
                RouteOutcome::Failed(_) => report.failed += 1,
            }
        }

        Ok(())
    }

    /// Poll the liveness URL and log the answer
    pub async fn heartbeat(&self) {
        match self.gateway.heartbeat().await {
            Ok(Some(status)) => info!(status, "Heartbeat"),
            Ok(None) => {},
            Err(e) => warn!(error = %e, "Heartbeat failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerConfig, ChannelMessage, Destination};
    use crate::test_utils::{MemoryChannel, MockProcurementGateway};

    const QUEUE: &str = "library.book.orders";

    fn job(channel: &MemoryChannel, gateway: Arc<MockProcurementGateway>) -> ProcurementJob {
        let channel: Arc<MemoryChannel> = Arc::new(channel.clone());
        ProcurementJob::new(
            QueueDrainer::new(channel.clone()),
            gateway,
            CategoryRouter::from_config(channel, &BrokerConfig::default()),
            JobSettings {
                library_id: "L1".to_string(),
                orders_queue: QUEUE.to_string(),
                idle_timeout: Duration::from_millis(20),
            },
        )
    }

    fn queue_orders(channel: &MemoryChannel, isbns: &[i64]) {
        for isbn in isbns {
            channel.push(
                &Destination::Queue(QUEUE.to_string()),
                ChannelMessage::text(format!("L1:{}", isbn)),
            );
        }
    }

    #[test]
    fn test_report_display() {
        let report = CycleReport {
            drained: 2,
            submitted: true,
            stopped_at: CycleState::Fetching,
            error: Some("boom".to_string()),
            ..CycleReport::default()
        };
        let text = report.to_string();
        assert!(text.contains("drained=2"));
        assert!(text.contains("stopped_at=fetching"));
        assert!(text.ends_with("error=\"boom\""));
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_empty_drain_skips_submit_and_fetch() {
        let channel = MemoryChannel::new();
        let gateway = Arc::new(MockProcurementGateway::new());
        let job = job(&channel, gateway.clone());

        let report = job.run_cycle(1).await;

        assert_eq!(report.drained, 0);
        assert!(!report.submitted);
        assert_eq!(report.stopped_at, CycleState::Draining);
        assert!(gateway.submitted_batches().is_empty());
        assert_eq!(gateway.fetch_count(), 0);
        assert_eq!(job.state(), CycleState::Idle);
    }

    #[tokio::test]
    async fn test_full_cycle_routes_parsed_records() {
        let channel = MemoryChannel::new();
        queue_orders(&channel, &[10, 11]);
        let gateway = Arc::new(MockProcurementGateway::new());
        gateway.set_results(
            r#"{"msg":"ok","shipped_books":[
                {"isbn":10,"title":"T1","category":"computer","coverimage":"http://x"},
                {"isbn":11,"title":"T2","category":"unknown","coverimage":"http://y"},
                {"title":"no isbn","category":"comics"}
            ]}"#,
        );
        let job = job(&channel, gateway.clone());

        let report = job.run_cycle(1).await;

        assert!(report.is_clean());
        assert_eq!(report.drained, 2);
        assert!(report.submitted);
        assert_eq!(report.parsed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.routed, 1);
        assert_eq!(report.unrouted, 1);
        assert_eq!(report.stopped_at, CycleState::Routing);

        let batches = gateway.submitted_batches();
        assert_eq!(batches, vec![OrderBatch::new("L1", vec![10, 11])]);
        assert_eq!(channel.published_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_submit_skips_fetch() {
        let channel = MemoryChannel::new();
        queue_orders(&channel, &[10]);
        let gateway = Arc::new(MockProcurementGateway::new());
        gateway.reject_submissions(500);
        let job = job(&channel, gateway.clone());

        let report = job.run_cycle(1).await;

        assert_eq!(report.stopped_at, CycleState::Submitting);
        assert!(!report.submitted);
        assert!(report.error.as_deref().unwrap().contains("500"));
        assert_eq!(gateway.fetch_count(), 0);
        assert_eq!(channel.published_count(), 0);
        assert_eq!(job.state(), CycleState::Idle);
    }

    #[tokio::test]
    async fn test_rejected_fetch_ends_cycle_after_submit() {
        let channel = MemoryChannel::new();
        queue_orders(&channel, &[10]);
        let gateway = Arc::new(MockProcurementGateway::new());
        gateway.reject_fetches(404);
        let job = job(&channel, gateway.clone());

        let report = job.run_cycle(1).await;

        assert!(report.submitted);
        assert_eq!(report.stopped_at, CycleState::Fetching);
        assert_eq!(gateway.fetch_count(), 1);
        assert_eq!(channel.published_count(), 0);
    }

    #[tokio::test]
    async fn test_state_transitions_are_observable() {
        let channel = MemoryChannel::new();
        let job = job(&channel, Arc::new(MockProcurementGateway::new()));
        let states = job.subscribe();

        job.run_cycle(1).await;

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow(), CycleState::Idle);
    }
}
