use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::env;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::api::error::ApiError;
use crate::models::{Role, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // email
    pub uid: i32,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }

    /// Records may be changed by their owner or by an admin.
    pub fn can_modify(&self, owner_id: Option<i32>) -> bool {
        self.is_admin() || owner_id == Some(self.uid)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        decode_jwt(token).map_err(|_| ApiError::unauthorized("Invalid or expired token"))
    }
}

/// Claims of a caller holding the admin role.
///
/// Extracting this before the request body means non-admin uploads are
/// refused without reading any multipart data.
#[derive(Debug, Clone)]
pub struct AdminClaims(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AdminClaims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            tracing::warn!("Admin endpoint refused for {}", claims.sub);
            return Err(ApiError::forbidden("Admin role required"));
        }
        Ok(AdminClaims(claims))
    }
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| e.to_string())?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Password for accounts created by import; nobody knows it until reset.
pub fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn get_jwt_secret() -> Result<String, String> {
    match env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => Ok(secret),
        _ if cfg!(debug_assertions) => Ok("secret".to_string()),
        _ => Err("JWT_SECRET environment variable must be set in production".to_string()),
    }
}

pub fn create_jwt(user: &User) -> Result<String, String> {
    let secret = get_jwt_secret()?;
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or("invalid expiry timestamp")?
        .timestamp();

    let claims = Claims {
        sub: user.email.clone(),
        uid: user.id,
        role: user.role.clone(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

pub fn decode_jwt(token: &str) -> Result<Claims, String> {
    let secret = get_jwt_secret()?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: 7,
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            full_name: None,
            role: role.to_string(),
            is_active: true,
            is_verified: true,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_jwt_round_trip_carries_identity_and_role() {
        let token = create_jwt(&user("admin")).unwrap();
        let claims = decode_jwt(&token).unwrap();
        assert_eq!(claims.sub, "ada@example.com");
        assert_eq!(claims.uid, 7);
        assert!(claims.is_admin());

        let member = decode_jwt(&create_jwt(&user("member")).unwrap()).unwrap();
        assert!(!member.is_admin());
    }

    #[test]
    fn test_only_owners_and_admins_modify() {
        let member = decode_jwt(&create_jwt(&user("member")).unwrap()).unwrap();
        assert!(member.can_modify(Some(7)));
        assert!(!member.can_modify(Some(8)));
        assert!(!member.can_modify(None));

        let admin = decode_jwt(&create_jwt(&user("admin")).unwrap()).unwrap();
        assert!(admin.can_modify(Some(8)));
        assert!(admin.can_modify(None));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let mut token = create_jwt(&user("member")).unwrap();
        token.push('x');
        assert!(decode_jwt(&token).is_err());
    }

    #[test]
    fn test_password_hash_verifies() {
        let password = random_password();
        assert_eq!(password.len(), 32);
        let hash = hash_password(&password).unwrap();
        assert!(verify_password(&password, &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
