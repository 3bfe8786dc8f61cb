//! Procurement service module
//!
//! This module provides:
//! - The [`ProcurementGateway`] seam the relay job talks to
//! - An HTTP implementation using reqwest
//! - Parsing of the order results payload into per-record outcomes

mod client;
mod config;
mod parser;

pub use client::HttpProcurementClient;
pub use config::ProcurementConfig;
pub use parser::{parse_results, RecordOutcome, SkipReason};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::OrderBatch;

/// What happened to a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted by the service
    Submitted,
    /// Nothing to send; no request was made
    SkippedEmpty,
}

/// Remote procurement service
#[async_trait]
pub trait ProcurementGateway: Send + Sync {
    /// Send an order batch; an empty batch is never sent
    async fn submit(&self, batch: &OrderBatch) -> Result<SubmitOutcome>;

    /// Raw order results body for a library
    async fn fetch_results(&self, library_id: &str) -> Result<String>;

    /// Poll the liveness URL; `None` when no URL is configured
    async fn heartbeat(&self) -> Result<Option<u16>>;

    /// Fetch and parse order results
    async fn fetch_records(&self, library_id: &str) -> Result<Vec<RecordOutcome>> {
        let body = self.fetch_results(library_id).await?;
        Ok(parse_results(&body))
    }
}
