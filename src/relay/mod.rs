//! Relay pipeline
//!
//! This module provides:
//! - The category router that fans procured records out to topics
//! - The procurement job running one drain/submit/fetch/route cycle
//! - The scheduler driving the job on a fixed period

mod job;
mod router;
mod scheduler;

pub use job::{CycleReport, CycleState, JobSettings, ProcurementJob};
pub use router::{CategoryRouter, RouteOutcome};
pub use scheduler::{Scheduler, RELAY_COMPONENT};
