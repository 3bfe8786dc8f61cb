//! Library book routes
//!
//! Reporting a book as `lost` places a procurement order for it on the
//! orders queue.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::models::{Book, BookStatus};

/// Query of the status update route
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

/// `GET /library/v1/books`
pub async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<Book>>> {
    Ok(Json(state.catalog.list().await?))
}

/// `POST /library/v1/books`
pub async fn create_book(
    State(state): State<AppState>,
    Json(book): Json<Book>,
) -> Result<impl IntoResponse> {
    let saved = state.catalog.save(book).await?;
    info!(isbn = saved.isbn, title = %saved.title, "Book created");
    Ok((StatusCode::CREATED, Json(saved)))
}

/// `GET /library/v1/books/:isbn`
pub async fn get_book(State(state): State<AppState>, Path(isbn): Path<i64>) -> Result<Json<Book>> {
    state
        .catalog
        .get(isbn)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("Book {} not found", isbn)))
}

/// `DELETE /library/v1/books/:isbn`
pub async fn delete_book(State(state): State<AppState>, Path(isbn): Path<i64>) -> Result<StatusCode> {
    if state.catalog.delete(isbn).await? {
        info!(isbn, "Book deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("Book {} not found", isbn)))
    }
}

/// `PUT /library/v1/books/:isbn?status=<status>`
///
/// A book set to `lost` is reordered. The status change stands even when
/// the order cannot be enqueued; the error is returned to the caller.
pub async fn update_book_status(
    State(state): State<AppState>,
    Path(isbn): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Book>> {
    let status = BookStatus::from_str(&query.status)?;
    let book = state.catalog.update_status(isbn, status).await?;

    if status == BookStatus::Lost {
        state.enqueuer.enqueue(&state.library_id, isbn).await?;
        info!(isbn, library_id = %state.library_id, "Lost book reordered");
    }

    Ok(Json(book))
}
