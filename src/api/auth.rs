use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::auth::{create_jwt, hash_password, verify_password, Claims};
use crate::domain::{KeyMatch, NewUser, ProfileUpdate};
use crate::infrastructure::AppState;
use crate::models::Role;
use crate::services::validation::is_valid_email;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    username: String,
    password: String,
    full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct PasswordChange {
    current_password: String,
    new_password: String,
}

fn check_password_length(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation_error(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Create an account. The first account created becomes the administrator.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email or username already taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let email = payload.email.trim().to_string();
    let username = payload.username.trim().to_string();

    if !is_valid_email(&email) {
        return Err(ApiError::validation_error("email must be a valid email address"));
    }
    if username.is_empty() {
        return Err(ApiError::validation_error("username is required"));
    }
    check_password_length(&payload.password)?;

    if state
        .user_repo
        .find_by_email(&email, KeyMatch::CaseInsensitive)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Email is already registered"));
    }
    if state
        .user_repo
        .find_by_username(&username, KeyMatch::CaseInsensitive)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let role = if state.user_repo.count().await? == 0 {
        Role::Admin
    } else {
        Role::Member
    };
    let password_hash = hash_password(&payload.password).map_err(ApiError::internal_error)?;

    let user = state
        .user_repo
        .create(NewUser {
            email,
            username,
            password_hash,
            full_name: payload.full_name.filter(|n| !n.trim().is_empty()),
            role: role.as_str().to_string(),
            is_active: true,
            is_verified: false,
        })
        .await?;
    tracing::info!("Registered {} as {}", user.email, user.role);

    let token = create_jwt(&user).map_err(ApiError::internal_error)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "token": token })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::info!("Login attempt for {}", payload.email);

    let Some((user, password_hash)) = state.user_repo.find_credentials(payload.email.trim()).await?
    else {
        tracing::warn!("Unknown account: {}", payload.email);
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&payload.password, &password_hash).unwrap_or(false) {
        tracing::warn!("Password verification failed for {}", user.email);
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let token = create_jwt(&user).map_err(ApiError::internal_error)?;
    Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn me(State(state): State<AppState>, claims: Claims) -> Result<Json<Value>, ApiError> {
    let user = state
        .user_repo
        .find_by_id(claims.uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "user": user })))
}

/// Update the caller's email, username or full name. Returns the profile and
/// a token carrying the new email.
#[utoipa::path(
    put,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "Invalid profile data"),
        (status = 409, description = "Email or username already taken")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    claims: Claims,
    Json(mut changes): Json<ProfileUpdate>,
) -> Result<Json<Value>, ApiError> {
    if let Some(email) = changes.email.as_mut() {
        *email = email.trim().to_string();
        if !is_valid_email(email) {
            return Err(ApiError::validation_error("email must be a valid email address"));
        }
        let taken = state
            .user_repo
            .find_by_email(email, KeyMatch::CaseInsensitive)
            .await?
            .is_some_and(|other| other.id != claims.uid);
        if taken {
            return Err(ApiError::conflict("Email is already registered"));
        }
    }
    if let Some(username) = changes.username.as_mut() {
        *username = username.trim().to_string();
        if username.is_empty() {
            return Err(ApiError::validation_error("username cannot be empty"));
        }
        let taken = state
            .user_repo
            .find_by_username(username, KeyMatch::CaseInsensitive)
            .await?
            .is_some_and(|other| other.id != claims.uid);
        if taken {
            return Err(ApiError::conflict("Username is already taken"));
        }
    }

    let user = state.user_repo.update_profile(claims.uid, changes).await?;
    tracing::info!("Profile of user {} updated", user.id);

    let token = create_jwt(&user).map_err(ApiError::internal_error)?;
    Ok(Json(json!({ "user": user, "token": token })))
}

#[utoipa::path(
    put,
    path = "/api/auth/me/password",
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
    check_password_length(&payload.new_password)?;

    let user = state
        .user_repo
        .find_by_id(claims.uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let (_, password_hash) = state
        .user_repo
        .find_credentials(&user.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&payload.current_password, &password_hash).unwrap_or(false) {
        tracing::warn!("Password change refused for {}: wrong current password", user.email);
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let new_hash = hash_password(&payload.new_password).map_err(ApiError::internal_error)?;
    state.user_repo.update_password(user.id, new_hash).await?;
    tracing::info!("Password changed for {}", user.email);
    Ok(StatusCode::NO_CONTENT)
}
