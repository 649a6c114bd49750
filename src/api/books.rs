use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::auth::Claims;
use crate::domain::{BookFilter, BookUpdate, NewBook};
use crate::infrastructure::AppState;
use crate::models::Book;

const MAX_PUBLISHED_YEAR: i32 = 9999;

/// Load a book the caller may change.
async fn owned_book(state: &AppState, claims: &Claims, id: i32) -> Result<Book, ApiError> {
    let book = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;
    if !claims.can_modify(book.owner_id) {
        tracing::warn!("{} tried to change book {} owned by {:?}", claims.sub, id, book.owner_id);
        return Err(ApiError::forbidden("Only the owner or an admin can change this book"));
    }
    Ok(book)
}

fn check_year(year: Option<i32>) -> Result<(), ApiError> {
    match year {
        Some(y) if !(0..=MAX_PUBLISHED_YEAR).contains(&y) => Err(ApiError::validation_error(
            format!("published_year must be between 0 and {}", MAX_PUBLISHED_YEAR),
        )),
        _ => Ok(()),
    }
}

#[utoipa::path(
    get,
    path = "/api/books",
    params(BookFilter),
    responses(
        (status = 200, description = "List of books")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    _claims: Claims,
    Query(filter): Query<BookFilter>,
) -> Result<Json<Value>, ApiError> {
    let books = state.book_repo.find_all(filter).await?;
    let total = books.len();
    Ok(Json(json!({ "books": books, "total": total })))
}

#[utoipa::path(
    post,
    path = "/api/books",
    responses(
        (status = 201, description = "Book created"),
        (status = 400, description = "Missing title, author or isbn"),
        (status = 409, description = "ISBN already catalogued")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    claims: Claims,
    Json(mut book): Json<NewBook>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    for (name, value) in [
        ("title", &book.title),
        ("author", &book.author),
        ("isbn", &book.isbn),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::validation_error(format!("{} is required", name)));
        }
    }
    check_year(book.published_year)?;
    book.owner_id = Some(claims.uid);

    let created = state.book_repo.create(book).await?;
    tracing::info!("Book {} created by {}", created.id, claims.sub);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Book created", "book": created })),
    ))
}

pub async fn get_book(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let book = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;
    let libraries = state.book_repo.libraries_of(id).await?;
    Ok(Json(json!({ "book": book, "libraries": libraries })))
}

#[utoipa::path(
    put,
    path = "/api/books/{id}",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book updated"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "ISBN already catalogued")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(changes): Json<BookUpdate>,
) -> Result<Json<Value>, ApiError> {
    for (name, value) in [
        ("title", &changes.title),
        ("author", &changes.author),
        ("isbn", &changes.isbn),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ApiError::validation_error(format!("{} cannot be empty", name)));
        }
    }
    check_year(changes.published_year)?;

    owned_book(&state, &claims, id).await?;
    let book = state.book_repo.update(id, changes).await?;
    tracing::info!("Book {} updated by {}", id, claims.sub);
    Ok(Json(json!({ "message": "Book updated", "book": book })))
}

#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    owned_book(&state, &claims, id).await?;
    state.book_repo.delete(id).await?;
    tracing::info!("Book {} deleted by {}", id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_library(
    State(state): State<AppState>,
    claims: Claims,
    Path((id, library_id)): Path<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    owned_book(&state, &claims, id).await?;
    state.book_repo.assign_library(id, library_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_library(
    State(state): State<AppState>,
    claims: Claims,
    Path((id, library_id)): Path<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    owned_book(&state, &claims, id).await?;
    state.book_repo.unassign_library(id, library_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
