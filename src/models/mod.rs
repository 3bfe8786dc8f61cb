//! Data models for the procurement relay
//!
//! Orders as they travel through the queue, book records as they come back
//! from procurement and go out on category topics, and catalog books.

pub mod book;
pub mod error;
pub mod order;

// Re-export commonly used types
pub use book::{Book, BookRecord, BookStatus, Category, RoutedMessage};
pub use error::{ValidationError, ValidationErrorKind, ValidationErrors};
pub use order::{order_isbn, OrderBatch, OrderRecord};
