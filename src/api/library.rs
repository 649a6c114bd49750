use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::auth::Claims;
use crate::domain::{LibraryFilter, LibraryUpdate, NewLibrary};
use crate::infrastructure::AppState;
use crate::models::Library;

async fn owned_library(state: &AppState, claims: &Claims, id: i32) -> Result<Library, ApiError> {
    let library = state
        .library_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Library not found"))?;
    if !claims.can_modify(library.owner_id) {
        tracing::warn!("{} tried to change library {}", claims.sub, id);
        return Err(ApiError::forbidden("Only the owner or an admin can change this library"));
    }
    Ok(library)
}

pub async fn list_libraries(
    State(state): State<AppState>,
    _claims: Claims,
    Query(filter): Query<LibraryFilter>,
) -> Result<Json<Value>, ApiError> {
    let libraries = state.library_repo.find_all(filter).await?;
    let total = libraries.len();
    Ok(Json(json!({ "libraries": libraries, "total": total })))
}

pub async fn create_library(
    State(state): State<AppState>,
    claims: Claims,
    Json(mut library): Json<NewLibrary>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if library.name.trim().is_empty() {
        return Err(ApiError::validation_error("name is required"));
    }
    if library.address.trim().is_empty() {
        return Err(ApiError::validation_error("address is required"));
    }
    library.owner_id = Some(claims.uid);

    let created = state.library_repo.create(library).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Library created", "library": created })),
    ))
}

pub async fn get_library(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let library = state
        .library_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Library not found"))?;
    Ok(Json(json!({ "library": library })))
}

pub async fn update_library(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(changes): Json<LibraryUpdate>,
) -> Result<Json<Value>, ApiError> {
    for (name, value) in [("name", &changes.name), ("address", &changes.address)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ApiError::validation_error(format!("{} cannot be empty", name)));
        }
    }

    owned_library(&state, &claims, id).await?;
    let library = state.library_repo.update(id, changes).await?;
    tracing::info!("Library {} updated by {}", id, claims.sub);
    Ok(Json(json!({ "message": "Library updated", "library": library })))
}

pub async fn delete_library(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    owned_library(&state, &claims, id).await?;
    state.library_repo.delete(id).await?;
    tracing::info!("Library {} deleted by {}", id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

/// Books held by one library
pub async fn library_books(
    State(state): State<AppState>,
    _claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    if state.library_repo.find_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("Library not found"));
    }
    let books = state.library_repo.books_in(id).await?;
    let total = books.len();
    Ok(Json(json!({ "books": books, "total": total })))
}
