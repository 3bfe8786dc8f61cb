//! Book models shared by the relay and the catalog
//!
//! [`BookRecord`] is what the procurement service returns for an order;
//! [`RoutedMessage`] is its wire form on the category topics; [`Book`] is the
//! catalog entry a library keeps.

use serde::{Deserialize, Serialize};

use super::error::{ValidationError, ValidationErrorKind, ValidationErrors, ValidationResult};
use super::order::validate_isbn;

/// Categories that have a subscriber topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Computer,
    Management,
    Comics,
    #[serde(rename = "selfimprovement")]
    SelfImprovement,
}

impl Category {
    /// Every routable category
    pub const ALL: [Category; 4] = [
        Category::Computer,
        Category::Management,
        Category::Comics,
        Category::SelfImprovement,
    ];

    /// Case-insensitive exact match against the routable categories
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
    }

    /// Slug used in topic names
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Computer => "computer",
            Category::Management => "management",
            Category::Comics => "comics",
            Category::SelfImprovement => "selfimprovement",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A book recovered from the procurement results payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub isbn: i64,
    pub title: String,
    /// Category exactly as the server sent it; matched case-insensitively
    pub category: String,
    #[serde(rename = "coverimage")]
    pub cover_image: String,
}

impl BookRecord {
    /// Routable category of this record, if any
    pub fn routable_category(&self) -> Option<Category> {
        Category::parse(&self.category)
    }
}

/// Text form of a [`BookRecord`] published on a category topic
///
/// Layout: `<isbn>:"<title>":"<category>":"<coverimage>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub record: BookRecord,
}

const QUOTED_SEPARATOR: &str = "\":\"";

impl RoutedMessage {
    pub fn new(record: BookRecord) -> Self {
        Self { record }
    }

    /// Encode the record for publication
    pub fn encode(&self) -> String {
        format!(
            "{}:\"{}\":\"{}\":\"{}\"",
            self.record.isbn, self.record.title, self.record.category, self.record.cover_image
        )
    }

    /// Decode a published record
    ///
    /// Category and cover image are taken from the right so that a title
    /// containing quotes or colons still decodes.
    pub fn decode(body: &str) -> ValidationResult<Self> {
        let malformed = |context: &str| {
            ValidationError::with_context(ValidationErrorKind::MalformedBody, "body", context)
        };

        let (isbn_field, rest) = body
            .split_once(':')
            .ok_or_else(|| malformed("missing isbn separator"))?;

        let isbn = isbn_field.trim().parse::<i64>().map_err(|e| {
            ValidationError::with_context(
                ValidationErrorKind::InvalidIsbn,
                "isbn",
                format!("'{}': {}", isbn_field, e),
            )
        })?;

        let quoted = rest
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .ok_or_else(|| malformed("fields must be quoted"))?;

        let mut fields = quoted.rsplitn(3, QUOTED_SEPARATOR);
        let cover_image = fields.next().ok_or_else(|| malformed("missing coverimage"))?;
        let category = fields.next().ok_or_else(|| malformed("missing category"))?;
        let title = fields.next().ok_or_else(|| malformed("missing title"))?;

        Ok(Self::new(BookRecord {
            isbn,
            title: title.to_string(),
            category: category.to_string(),
            cover_image: cover_image.to_string(),
        }))
    }
}

/// Lifecycle of a catalog book
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookStatus {
    #[default]
    Available,
    CheckedOut,
    InQueue,
    Lost,
}

impl BookStatus {
    /// Parse a status from its wire name (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, ValidationError> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(BookStatus::Available),
            "checked-out" => Ok(BookStatus::CheckedOut),
            "in-queue" => Ok(BookStatus::InQueue),
            "lost" => Ok(BookStatus::Lost),
            _ => Err(ValidationError::with_context(
                ValidationErrorKind::UnknownStatus,
                "status",
                format!("Unknown status: {}", s),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::CheckedOut => "checked-out",
            BookStatus::InQueue => "in-queue",
            BookStatus::Lost => "lost",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A book held in a library catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Assigned by the catalog on save; ignored on input
    #[serde(default)]
    pub isbn: i64,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, rename = "coverimage")]
    pub cover_image: String,
    #[serde(default)]
    pub status: BookStatus,
}

impl Book {
    /// Check the fields a new catalog entry needs
    pub fn validate_new(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.title.trim().is_empty() {
            errors.add(ValidationError::new(ValidationErrorKind::RequiredField, "title"));
        }

        if self.category.trim().is_empty() {
            errors.add(ValidationError::new(
                ValidationErrorKind::RequiredField,
                "category",
            ));
        }

        errors.into_result(())
    }

    /// Check that the ISBN is usable as a catalog key
    pub fn validate_isbn(&self) -> ValidationResult<()> {
        validate_isbn(self.isbn)
    }
}

impl From<BookRecord> for Book {
    fn from(record: BookRecord) -> Self {
        Self {
            isbn: record.isbn,
            title: record.title,
            category: record.category,
            cover_image: record.cover_image,
            status: BookStatus::Available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str) -> BookRecord {
        BookRecord {
            isbn: 10,
            title: "T1".to_string(),
            category: category.to_string(),
            cover_image: "http://x".to_string(),
        }
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("computer"), Some(Category::Computer));
        assert_eq!(Category::parse("MANAGEMENT"), Some(Category::Management));
        assert_eq!(Category::parse("Comics"), Some(Category::Comics));
        assert_eq!(
            Category::parse("SelfImprovement"),
            Some(Category::SelfImprovement)
        );
    }

    #[test]
    fn test_category_parse_requires_exact_match() {
        assert_eq!(Category::parse("unknown"), None);
        assert_eq!(Category::parse(""), None);
        assert_eq!(Category::parse(" computer"), None);
        assert_eq!(Category::parse("self-improvement"), None);
        assert_eq!(Category::parse("computers"), None);
    }

    #[test]
    fn test_routed_message_encoding() {
        let message = RoutedMessage::new(record("computer"));
        assert_eq!(message.encode(), "10:\"T1\":\"computer\":\"http://x\"");
    }

    #[test]
    fn test_routed_message_preserves_category_case() {
        let message = RoutedMessage::new(record("Comics"));
        assert_eq!(message.encode(), "10:\"T1\":\"Comics\":\"http://x\"");
    }

    #[test]
    fn test_routed_message_decode() {
        let decoded = RoutedMessage::decode("10:\"T1\":\"computer\":\"http://x\"").unwrap();
        assert_eq!(decoded.record, record("computer"));
    }

    #[test]
    fn test_routed_message_decode_title_with_separators() {
        let mut original = record("comics");
        original.title = "Batman: \"Year\":\"One\"".to_string();
        let decoded = RoutedMessage::decode(&RoutedMessage::new(original.clone()).encode()).unwrap();
        assert_eq!(decoded.record, original);
    }

    #[test]
    fn test_routed_message_decode_rejects_garbage() {
        assert!(RoutedMessage::decode("no separator").is_err());
        assert!(RoutedMessage::decode("x:\"a\":\"b\":\"c\"").is_err());
        assert!(RoutedMessage::decode("1:a:b:c").is_err());
        assert!(RoutedMessage::decode("1:\"only-title\"").is_err());
    }

    #[test]
    fn test_book_status_round_trip() {
        for status in [
            BookStatus::Available,
            BookStatus::CheckedOut,
            BookStatus::InQueue,
            BookStatus::Lost,
        ] {
            assert_eq!(BookStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(BookStatus::from_str("stolen").is_err());
        assert_eq!(BookStatus::from_str("LOST").unwrap(), BookStatus::Lost);
    }

    #[test]
    fn test_book_json_uses_library_field_names() {
        let book = Book::from(record("computer"));
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["coverimage"], "http://x");
        assert_eq!(json["status"], "available");
    }

    #[test]
    fn test_book_validation() {
        let mut book = Book::from(record("computer"));
        assert!(book.validate_new().is_ok());

        book.title = " ".to_string();
        book.category = String::new();
        let errors = book.validate_new().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
