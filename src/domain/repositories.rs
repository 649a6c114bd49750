//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use std::str::FromStr;

use super::DomainError;
use crate::models::{Book, JobRecord, Library, User};

/// How natural keys are compared during duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMatch {
    Exact,
    #[default]
    CaseInsensitive,
}

impl KeyMatch {
    /// Comparable form of a natural-key value under this mode.
    pub fn fold(&self, value: &str) -> String {
        match self {
            KeyMatch::Exact => value.trim().to_string(),
            KeyMatch::CaseInsensitive => fold_key(value),
        }
    }
}

/// Trimmed, Unicode-lowercased key. Stored alongside each natural-key
/// column so case-insensitive lookups do not depend on SQLite's ASCII-only
/// `LOWER()`.
pub fn fold_key(value: &str) -> String {
    value.trim().to_lowercase()
}

impl FromStr for KeyMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(KeyMatch::Exact),
            "case_insensitive" | "case-insensitive" => Ok(KeyMatch::CaseInsensitive),
            other => Err(format!("Invalid duplicate matching mode: {}", other)),
        }
    }
}

/// Input for creating a book
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: Option<i32>,
    pub description: Option<String>,
    #[serde(skip)]
    pub owner_id: Option<i32>,
}

/// Input for creating a library
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct NewLibrary {
    pub name: String,
    pub address: String,
    pub description: Option<String>,
    #[serde(skip)]
    pub owner_id: Option<i32>,
}

/// Partial book update; absent fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub description: Option<String>,
}

/// Partial library update
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct LibraryUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

/// Changes a user makes to their own profile
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

/// Input for creating a user. The password is already hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
}

/// Filter criteria for book queries
#[derive(Debug, Default, Clone, serde::Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookFilter {
    /// Title contains
    pub title: Option<String>,
    /// Author contains
    pub author: Option<String>,
    /// Owning user ID
    pub owner_id: Option<i32>,
    pub limit: Option<u64>,
}

/// Filter criteria for library queries
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct LibraryFilter {
    pub name: Option<String>,
    pub owner_id: Option<i32>,
    pub limit: Option<u64>,
}

/// Filter criteria for user queries
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct UserFilter {
    pub role: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<u64>,
}

/// Repository trait for Book entity
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find books matching the filter, oldest first
    async fn find_all(&self, filter: BookFilter) -> Result<Vec<Book>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError>;

    /// Find a book by its natural key
    async fn find_by_isbn(&self, isbn: &str, matching: KeyMatch)
        -> Result<Option<Book>, DomainError>;

    async fn create(&self, input: NewBook) -> Result<Book, DomainError>;

    /// Insert every book or none of them
    async fn bulk_create(&self, inputs: Vec<NewBook>) -> Result<u64, DomainError>;

    async fn update(&self, id: i32, changes: BookUpdate) -> Result<Book, DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;

    /// Link a book to a library. Both must exist.
    async fn assign_library(&self, book_id: i32, library_id: i32) -> Result<(), DomainError>;

    async fn unassign_library(&self, book_id: i32, library_id: i32) -> Result<(), DomainError>;

    async fn libraries_of(&self, book_id: i32) -> Result<Vec<Library>, DomainError>;

    /// Number of book-library links
    async fn count_links(&self) -> Result<u64, DomainError>;
}

/// Repository trait for Library entity
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn find_all(&self, filter: LibraryFilter) -> Result<Vec<Library>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Library>, DomainError>;

    /// Find a library by its natural key (name and address)
    async fn find_by_name_and_address(
        &self,
        name: &str,
        address: &str,
        matching: KeyMatch,
    ) -> Result<Option<Library>, DomainError>;

    async fn create(&self, input: NewLibrary) -> Result<Library, DomainError>;

    async fn bulk_create(&self, inputs: Vec<NewLibrary>) -> Result<u64, DomainError>;

    async fn update(&self, id: i32, changes: LibraryUpdate) -> Result<Library, DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;

    /// Books held by a library
    async fn books_in(&self, library_id: i32) -> Result<Vec<Book>, DomainError>;
}

/// Repository trait for User entity
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self, filter: UserFilter) -> Result<Vec<User>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, DomainError>;

    /// Find a user by its natural key
    async fn find_by_email(&self, email: &str, matching: KeyMatch)
        -> Result<Option<User>, DomainError>;

    async fn find_by_username(
        &self,
        username: &str,
        matching: KeyMatch,
    ) -> Result<Option<User>, DomainError>;

    /// User and stored password hash, for login
    async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>, DomainError>;

    async fn create(&self, input: NewUser) -> Result<User, DomainError>;

    async fn bulk_create(&self, inputs: Vec<NewUser>) -> Result<u64, DomainError>;

    async fn update_profile(&self, id: i32, changes: ProfileUpdate) -> Result<User, DomainError>;

    /// Replace the stored hash of an already-hashed password
    async fn update_password(&self, id: i32, password_hash: String) -> Result<(), DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;

    async fn count_active(&self) -> Result<u64, DomainError>;

    async fn count_verified(&self) -> Result<u64, DomainError>;
}

/// Input for recording a newly submitted job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: uuid::Uuid,
    pub kind: String,
    pub target: String,
    pub submitted_by: Option<i32>,
}

/// Repository trait for the durable job status table
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, input: NewJob) -> Result<JobRecord, DomainError>;

    async fn find_by_id(&self, id: uuid::Uuid) -> Result<Option<JobRecord>, DomainError>;

    /// Most recent jobs first
    async fn list(&self, limit: u64) -> Result<Vec<JobRecord>, DomainError>;

    /// Move a pending job to running. Returns false when the job is no
    /// longer pending (cancelled before a worker picked it up).
    async fn mark_running(&self, id: uuid::Uuid) -> Result<bool, DomainError>;

    async fn mark_succeeded(
        &self,
        id: uuid::Uuid,
        result: serde_json::Value,
    ) -> Result<(), DomainError>;

    /// Returns false when the job had already finished.
    async fn mark_failed(&self, id: uuid::Uuid, error: &str) -> Result<bool, DomainError>;

    /// Fail every pending or running job; used at startup
    async fn fail_unfinished(&self, error: &str) -> Result<u64, DomainError>;

    /// Delete jobs that finished before the cutoff, returning them
    async fn delete_finished_before(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<JobRecord>, DomainError>;
}
