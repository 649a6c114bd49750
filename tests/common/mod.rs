#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`

use libris::auth::{create_jwt, hash_password};
use libris::config::Config;
use libris::db;
use libris::domain::NewUser;
use libris::infrastructure::AppState;
use libris::models::{Role, User};
use libris::server::build_router;

const BOUNDARY: &str = "libris-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = db::init_db("sqlite::memory:")
            .await
            .expect("Failed to init DB");
        let state = AppState::new(db, config);
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub async fn create_user(&self, email: &str, username: &str, role: Role) -> User {
        self.state
            .user_repo
            .create(NewUser {
                email: email.to_string(),
                username: username.to_string(),
                password_hash: hash_password("password123").unwrap(),
                full_name: None,
                role: role.as_str().to_string(),
                is_active: true,
                is_verified: false,
            })
            .await
            .expect("Failed to create user")
    }

    /// Admin account and its bearer token
    pub async fn admin(&self) -> (User, String) {
        let user = self.create_user("admin@example.com", "admin", Role::Admin).await;
        let token = create_jwt(&user).unwrap();
        (user, token)
    }

    pub async fn member(&self) -> (User, String) {
        let user = self.create_user("reader@example.com", "reader", Role::Member).await;
        let token = create_jwt(&user).unwrap();
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec(), disposition)
    }

    pub async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body, _) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        filename: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        self.json(upload_request(uri, token, filename, bytes)).await
    }

    /// Poll a job until it reaches a terminal status.
    pub async fn wait_for_job(&self, id: &str, token: &str) -> Value {
        for _ in 0..200 {
            let (status, job) = self.json(get(&format!("/api/jobs/{}", id), token)).await;
            assert_eq!(status, StatusCode::OK);
            if job["status"] == "succeeded" || job["status"] == "failed" {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {} did not finish", id);
    }
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn put_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn upload_request(uri: &str, token: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
