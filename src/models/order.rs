//! Order records and batches
//!
//! An order travels through the orders queue as the text `<library_id>:<isbn>`.
//! The drainer decodes it back and accumulates the ISBNs of one cycle into an
//! [`OrderBatch`], which is what the procurement service receives.

use serde::{Deserialize, Serialize};

use super::error::{ValidationError, ValidationErrorKind, ValidationResult};

/// Separator between library id and ISBN on the wire
pub const ORDER_FIELD_SEPARATOR: char = ':';

/// A single book order placed by a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Library placing the order
    pub library_id: String,
    /// Ordered book
    pub isbn: i64,
}

impl OrderRecord {
    /// Create a validated order record
    pub fn new(library_id: impl Into<String>, isbn: i64) -> ValidationResult<Self> {
        let library_id = library_id.into();
        validate_library_id(&library_id)?;
        validate_isbn(isbn)?;
        Ok(Self { library_id, isbn })
    }

    /// Encode as the queue message body
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.library_id, ORDER_FIELD_SEPARATOR, self.isbn)
    }

    /// Decode a queue message body
    ///
    /// The body is split on `:` and the second field is the ISBN. Anything
    /// after a third separator is rejected.
    pub fn decode(body: &str) -> ValidationResult<Self> {
        let mut fields = body.split(ORDER_FIELD_SEPARATOR);
        let library_id = fields.next().unwrap_or_default().trim();
        let isbn_field = fields.next().ok_or_else(|| {
            ValidationError::with_context(
                ValidationErrorKind::MalformedBody,
                "body",
                format!("expected <library_id>:<isbn>, got '{}'", body),
            )
        })?;

        if fields.next().is_some() {
            return Err(ValidationError::with_context(
                ValidationErrorKind::MalformedBody,
                "body",
                format!("too many fields in '{}'", body),
            ));
        }

        let isbn = isbn_field.trim().parse::<i64>().map_err(|e| {
            ValidationError::with_context(
                ValidationErrorKind::InvalidIsbn,
                "isbn",
                format!("'{}': {}", isbn_field, e),
            )
        })?;

        Self::new(library_id, isbn)
    }
}

/// ISBN carried by a queued order body
///
/// Only the second `:`-separated field is read; the library id and any
/// trailing fields are ignored. The field must be a positive integer.
pub fn order_isbn(body: &str) -> ValidationResult<i64> {
    let isbn_field = body.split(ORDER_FIELD_SEPARATOR).nth(1).ok_or_else(|| {
        ValidationError::with_context(
            ValidationErrorKind::MalformedBody,
            "body",
            format!("no isbn field in '{}'", body),
        )
    })?;

    let isbn = isbn_field.trim().parse::<i64>().map_err(|e| {
        ValidationError::with_context(
            ValidationErrorKind::InvalidIsbn,
            "isbn",
            format!("'{}': {}", isbn_field, e),
        )
    })?;

    validate_isbn(isbn)?;
    Ok(isbn)
}

/// The ISBNs drained in one relay cycle, in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBatch {
    /// Library the batch is submitted for
    #[serde(rename = "id")]
    pub library_id: String,
    /// Ordered ISBNs
    #[serde(rename = "order_book_isbns")]
    pub isbns: Vec<i64>,
}

impl OrderBatch {
    /// Create a batch for a library
    pub fn new(library_id: impl Into<String>, isbns: Vec<i64>) -> Self {
        Self {
            library_id: library_id.into(),
            isbns,
        }
    }

    /// Whether the batch carries no orders
    pub fn is_empty(&self) -> bool {
        self.isbns.is_empty()
    }

    /// Number of orders in the batch
    pub fn len(&self) -> usize {
        self.isbns.len()
    }
}

/// Library ids must be non-empty and free of the field separator
pub fn validate_library_id(library_id: &str) -> ValidationResult<()> {
    if library_id.trim().is_empty() || library_id.contains(ORDER_FIELD_SEPARATOR) {
        return Err(ValidationError::with_context(
            ValidationErrorKind::InvalidLibraryId,
            "library_id",
            format!("got '{}'", library_id),
        ));
    }
    Ok(())
}

/// ISBNs are positive integers
pub fn validate_isbn(isbn: i64) -> ValidationResult<()> {
    if isbn <= 0 {
        return Err(ValidationError::with_context(
            ValidationErrorKind::NonPositiveIsbn,
            "isbn",
            format!("ISBN was {} but expected greater than zero value", isbn),
        ));
    }
    Ok(())
}
