//! Import Service - turns an uploaded sheet into stored records
//!
//! Header resolution, per-row validation, duplicate detection and one
//! all-or-nothing bulk insert, producing an `ImportReport`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::validation::{validate_row, DuplicateDetector, TypedRow};
use crate::domain::{
    BookRepository, DomainError, EntityKind, LibraryRepository, NewBook, NewLibrary,
    NewUser, SchemaError, UserRepository,
};
use crate::infrastructure::auth::{hash_password, random_password};
use crate::models::Role;
use crate::spreadsheet::{read_sheet, FileFormat, RawSheet, ReadError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row: usize,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRow {
    pub row: usize,
    pub matched_existing_id: i32,
}

/// Per-row outcome of one import. Rows are numbered from 1 for the first
/// data row below the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub accepted: usize,
    pub rejected: Vec<RejectedRow>,
    pub duplicates: Vec<DuplicateRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error(transparent)]
    Parse(#[from] ReadError),
    #[error("Bulk insert failed: {message}")]
    BulkInsert { conflict: bool, message: String },
    #[error("Record store error: {0}")]
    Store(#[from] DomainError),
}

#[derive(Clone)]
pub struct ImportService {
    books: Arc<dyn BookRepository>,
    libraries: Arc<dyn LibraryRepository>,
    users: Arc<dyn UserRepository>,
    detector: DuplicateDetector,
}

impl ImportService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        libraries: Arc<dyn LibraryRepository>,
        users: Arc<dyn UserRepository>,
        detector: DuplicateDetector,
    ) -> Self {
        Self {
            books,
            libraries,
            users,
            detector,
        }
    }

    /// Read an uploaded file into a sheet, detecting its format from the
    /// file name or content type.
    pub fn parse(
        bytes: &[u8],
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<RawSheet, ImportError> {
        let format = FileFormat::detect(filename, content_type).ok_or_else(|| {
            ImportError::UnsupportedFileType(
                filename
                    .or(content_type)
                    .unwrap_or("unnamed upload")
                    .to_string(),
            )
        })?;

        Ok(read_sheet(bytes, format)?)
    }

    pub async fn import(
        &self,
        kind: EntityKind,
        sheet: &RawSheet,
        actor_id: Option<i32>,
    ) -> Result<ImportReport, ImportError> {
        let schema = kind.schema();
        let map = schema.resolve(&sheet.headers)?;
        let matching = self.detector.matching(kind);

        let mut report = ImportReport::default();
        let mut staged: Vec<TypedRow> = Vec::new();
        let mut staged_keys: HashMap<String, usize> = HashMap::new();
        let mut staged_usernames: HashMap<String, usize> = HashMap::new();

        for (index, cells) in sheet.rows.iter().enumerate() {
            let row = index + 1;
            if cells.iter().all(|cell| cell.is_blank()) {
                continue;
            }
            report.total += 1;

            let typed = match validate_row(schema, &map, cells) {
                Ok(typed) => typed,
                Err(reasons) => {
                    report.rejected.push(RejectedRow { row, reasons });
                    continue;
                }
            };

            if let Some(existing) = self.detector.find_existing(kind, &typed).await? {
                report.duplicates.push(DuplicateRow {
                    row,
                    matched_existing_id: existing,
                });
                continue;
            }

            let key = typed.natural_key(matching);
            if let Some(first) = staged_keys.get(&key) {
                report.rejected.push(RejectedRow {
                    row,
                    reasons: vec![format!(
                        "{} duplicates row {} in this file",
                        schema.key_label(),
                        first
                    )],
                });
                continue;
            }

            if kind == EntityKind::User {
                let username = matching.fold(&typed.text("username").unwrap_or_default());
                if let Some(first) = staged_usernames.get(&username) {
                    report.rejected.push(RejectedRow {
                        row,
                        reasons: vec![format!("username duplicates row {} in this file", first)],
                    });
                    continue;
                }
                if self.detector.username_taken(&typed).await? {
                    report.rejected.push(RejectedRow {
                        row,
                        reasons: vec!["username is already taken".to_string()],
                    });
                    continue;
                }
                staged_usernames.insert(username, row);
            }

            staged_keys.insert(key, row);
            staged.push(typed);
        }

        let inserted = self.insert(kind, staged, actor_id).await?;
        report.accepted = inserted as usize;

        tracing::info!(
            kind = %kind,
            total = report.total,
            accepted = report.accepted,
            rejected = report.rejected.len(),
            duplicates = report.duplicates.len(),
            "Import finished"
        );

        Ok(report)
    }

    async fn insert(
        &self,
        kind: EntityKind,
        rows: Vec<TypedRow>,
        actor_id: Option<i32>,
    ) -> Result<u64, ImportError> {
        let result = match kind {
            EntityKind::Book => {
                let books = rows.iter().map(|row| new_book(row, actor_id)).collect();
                self.books.bulk_create(books).await
            }
            EntityKind::Library => {
                let libraries = rows.iter().map(|row| new_library(row, actor_id)).collect();
                self.libraries.bulk_create(libraries).await
            }
            EntityKind::User => {
                let users = tokio::task::spawn_blocking(move || {
                    rows.iter().map(new_user).collect::<Result<Vec<_>, String>>()
                })
                .await
                .map_err(|e| DomainError::Internal(e.to_string()))?
                .map_err(DomainError::Internal)?;
                self.users.bulk_create(users).await
            }
        };

        result.map_err(|e| {
            tracing::error!(kind = %kind, "Bulk insert rolled back: {}", e);
            ImportError::BulkInsert {
                conflict: e.is_conflict(),
                message: e.to_string(),
            }
        })
    }
}

fn new_book(row: &TypedRow, owner_id: Option<i32>) -> NewBook {
    NewBook {
        title: row.text("title").unwrap_or_default(),
        author: row.text("author").unwrap_or_default(),
        isbn: row.text("isbn").unwrap_or_default(),
        published_year: row
            .integer("published_year")
            .and_then(|year| i32::try_from(year).ok()),
        description: row.text("description"),
        owner_id,
    }
}

fn new_library(row: &TypedRow, owner_id: Option<i32>) -> NewLibrary {
    NewLibrary {
        name: row.text("name").unwrap_or_default(),
        address: row.text("address").unwrap_or_default(),
        description: row.text("description"),
        owner_id,
    }
}

/// Imported accounts get an unguessable password; the sheet never carries
/// credentials.
fn new_user(row: &TypedRow) -> Result<NewUser, String> {
    Ok(NewUser {
        email: row.text("email").unwrap_or_default(),
        username: row.text("username").unwrap_or_default(),
        password_hash: hash_password(&random_password())?,
        full_name: row.text("full_name"),
        role: row
            .text("role")
            .unwrap_or_else(|| Role::Member.as_str().to_string()),
        is_active: row.boolean("is_active").unwrap_or(true),
        is_verified: row.boolean("is_verified").unwrap_or(false),
    })
}
