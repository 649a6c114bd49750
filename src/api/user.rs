use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::auth::AdminClaims;
use crate::domain::UserFilter;
use crate::infrastructure::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminClaims,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Value>, ApiError> {
    let users = state.user_repo.find_all(filter).await?;
    let total = users.len();
    Ok(Json(json!({ "users": users, "total": total })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminClaims(claims): AdminClaims,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    if id == claims.uid {
        return Err(ApiError::validation_error("Administrators cannot delete their own account"));
    }
    state.user_repo.delete(id).await?;
    tracing::info!("User {} deleted by {}", id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
