//! Procurement relay library
//!
//! Drains book orders from a queue, submits them to a procurement service
//! and fans the procured books out to per-category topics. The library API
//! and catalog that place orders and receive arrivals live here too.

pub mod api;
pub mod broker;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod procurement;
pub mod relay;
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use error::{Error, Result};

pub use models::{
    Book, BookRecord, BookStatus, Category, OrderBatch, OrderRecord, RoutedMessage,
    ValidationError, ValidationErrorKind,
};

pub use api::server::{create_router, create_server, shutdown_signal};
pub use api::{AppState, HealthState, HealthStatus};
