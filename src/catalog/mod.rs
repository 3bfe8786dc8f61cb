//! Library book catalog
//!
//! The catalog keeps the books a library owns. Books reported lost are
//! reordered through the orders queue; procured books come back over the
//! category topics and are applied with [`BookCatalog::mark_arrived`].

mod listener;

pub use listener::ArrivalListener;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Book, BookRecord, BookStatus};

/// What an arrival did to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalOutcome {
    /// A known book was set back to available
    Restocked,
    /// An unknown book was added as available
    Added,
}

/// Storage of catalog books
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// Look up a book by ISBN
    async fn get(&self, isbn: i64) -> Result<Option<Book>>;

    /// Add a new book, assigning its ISBN
    async fn save(&self, book: Book) -> Result<Book>;

    /// All books, ordered by ISBN
    async fn list(&self) -> Result<Vec<Book>>;

    /// Remove a book; `false` when it was not present
    async fn delete(&self, isbn: i64) -> Result<bool>;

    /// Change the status of an existing book
    async fn update_status(&self, isbn: i64, status: BookStatus) -> Result<Book>;

    /// Apply a procured book
    async fn mark_arrived(&self, record: BookRecord) -> Result<ArrivalOutcome>;
}

/// Catalog held in process memory
#[derive(Debug)]
pub struct InMemoryCatalog {
    books: RwLock<BTreeMap<i64, Book>>,
    next_isbn: AtomicI64,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            books: RwLock::new(BTreeMap::new()),
            next_isbn: AtomicI64::new(1),
        }
    }

    /// Create a catalog holding the two starter books
    pub fn seeded() -> Self {
        let seed = [
            Book {
                isbn: 1,
                title: "Java Concurrency in Practice".to_string(),
                category: "computer".to_string(),
                cover_image: "http://goo.gl/N96GJN".to_string(),
                status: BookStatus::Available,
            },
            Book {
                isbn: 2,
                title: "Restful Web Services".to_string(),
                category: "computer".to_string(),
                cover_image: "http://goo.gl/ZGmzoJ".to_string(),
                status: BookStatus::Available,
            },
        ];

        let books = seed.into_iter().map(|book| (book.isbn, book)).collect();
        Self {
            books: RwLock::new(books),
            next_isbn: AtomicI64::new(3),
        }
    }

    /// Keep generated ISBNs clear of one that entered from outside
    fn reserve(&self, isbn: i64) {
        self.next_isbn.fetch_max(isbn.saturating_add(1), Ordering::SeqCst);
    }
}

#[async_trait]
impl BookCatalog for InMemoryCatalog {
    async fn get(&self, isbn: i64) -> Result<Option<Book>> {
        Ok(self.books.read().await.get(&isbn).cloned())
    }

    async fn save(&self, mut book: Book) -> Result<Book> {
        book.validate_new()?;

        let mut books = self.books.write().await;
        let isbn = self.next_isbn.load(Ordering::SeqCst);
        if books.contains_key(&isbn) {
            return Err(Error::internal(format!("No free ISBN after {}", isbn)));
        }
        self.next_isbn.store(isbn.saturating_add(1), Ordering::SeqCst);

        book.isbn = isbn;
        books.insert(book.isbn, book.clone());

        debug!(isbn = book.isbn, title = %book.title, "Book saved");
        Ok(book)
    }

    async fn list(&self) -> Result<Vec<Book>> {
        Ok(self.books.read().await.values().cloned().collect())
    }

    async fn delete(&self, isbn: i64) -> Result<bool> {
        Ok(self.books.write().await.remove(&isbn).is_some())
    }

    async fn update_status(&self, isbn: i64, status: BookStatus) -> Result<Book> {
        let mut books = self.books.write().await;
        let book = books
            .get_mut(&isbn)
            .ok_or_else(|| Error::NotFound(format!("Book {} not found", isbn)))?;

        book.status = status;
        debug!(isbn, status = %status, "Book status updated");
        Ok(book.clone())
    }

    async fn mark_arrived(&self, record: BookRecord) -> Result<ArrivalOutcome> {
        let mut books = self.books.write().await;

        if let Some(book) = books.get_mut(&record.isbn) {
            book.status = BookStatus::Available;
            info!(isbn = record.isbn, title = %book.title, "Book restocked");
            return Ok(ArrivalOutcome::Restocked);
        }

        let book = Book::from(record);
        book.validate_isbn()?;
        self.reserve(book.isbn);
        info!(isbn = book.isbn, title = %book.title, "New book added to catalog");
        books.insert(book.isbn, book);
        Ok(ArrivalOutcome::Added)
    }
}
