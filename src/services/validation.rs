//! Row validation against the column schema, and duplicate lookup by
//! natural key.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::domain::schema::ColumnMap;
use crate::domain::{
    BookRepository, DomainError, EntityKind, EntitySchema, FieldType, KeyMatch,
    LibraryRepository, UserRepository,
};
use crate::models::Role;
use crate::spreadsheet::CellValue;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern is valid")
});

static EMPTY_CELL: CellValue = CellValue::Empty;

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// A coerced cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl FieldValue {
    pub fn to_cell(&self) -> CellValue {
        match self {
            FieldValue::Text(s) => CellValue::Text(s.clone()),
            FieldValue::Integer(n) => CellValue::Number(*n as f64),
            FieldValue::Bool(b) => CellValue::Bool(*b),
        }
    }
}

/// A row that passed validation; values follow schema column order and
/// absent optional cells are `None`.
#[derive(Debug, Clone)]
pub struct TypedRow {
    schema: &'static EntitySchema,
    values: Vec<Option<FieldValue>>,
}

impl TypedRow {
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.schema
            .column_index(column)
            .and_then(|i| self.values.get(i))
            .and_then(Option::as_ref)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Integer(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
        }
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, column: &str) -> Option<bool> {
        match self.get(column)? {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Comparable natural key of this row under the given matching mode.
    pub fn natural_key(&self, matching: KeyMatch) -> String {
        self.schema
            .natural_key_columns()
            .map(|column| matching.fold(&self.text(column.name).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}

fn coerce_integer(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_bool(cell: &CellValue) -> Option<bool> {
    match cell {
        CellValue::Bool(b) => Some(*b),
        CellValue::Number(n) if *n == 1.0 => Some(true),
        CellValue::Number(n) if *n == 0.0 => Some(false),
        CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Check every column of one row. On failure, returns one reason per
/// offending column in schema order.
pub fn validate_row(
    schema: &'static EntitySchema,
    map: &ColumnMap,
    cells: &[CellValue],
) -> Result<TypedRow, Vec<String>> {
    let mut values = Vec::with_capacity(schema.columns.len());
    let mut reasons = Vec::new();

    for (index, column) in schema.columns.iter().enumerate() {
        let cell = map
            .position(index)
            .and_then(|position| cells.get(position))
            .unwrap_or(&EMPTY_CELL);

        if cell.is_blank() {
            if column.required {
                reasons.push(format!("{} is required", column.name));
            }
            values.push(None);
            continue;
        }

        let value = match column.field_type {
            FieldType::Text => Some(FieldValue::Text(cell.to_text())),
            FieldType::Integer => match coerce_integer(cell) {
                Some(n) => match (column.min, column.max) {
                    (Some(min), _) if n < min => {
                        reasons.push(format!("{} must be >= {}", column.name, min));
                        None
                    }
                    (_, Some(max)) if n > max => {
                        reasons.push(format!("{} must be <= {}", column.name, max));
                        None
                    }
                    _ => Some(FieldValue::Integer(n)),
                },
                None => {
                    reasons.push(format!("{} must be integer", column.name));
                    None
                }
            },
            FieldType::Email => {
                let text = cell.to_text();
                if is_valid_email(&text) {
                    Some(FieldValue::Text(text))
                } else {
                    reasons.push(format!("{} must be a valid email address", column.name));
                    None
                }
            }
            FieldType::Boolean => match coerce_bool(cell) {
                Some(b) => Some(FieldValue::Bool(b)),
                None => {
                    reasons.push(format!("{} must be boolean", column.name));
                    None
                }
            },
            FieldType::Role => match cell.to_text().parse::<Role>() {
                Ok(role) => Some(FieldValue::Text(role.as_str().to_string())),
                Err(_) => {
                    let allowed: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
                    reasons.push(format!("{} must be one of: {}", column.name, allowed.join(", ")));
                    None
                }
            },
        };
        values.push(value);
    }

    if reasons.is_empty() {
        Ok(TypedRow { schema, values })
    } else {
        Err(reasons)
    }
}

/// Looks rows up in the record store by natural key.
#[derive(Clone)]
pub struct DuplicateDetector {
    books: Arc<dyn BookRepository>,
    libraries: Arc<dyn LibraryRepository>,
    users: Arc<dyn UserRepository>,
    matching: KeyMatch,
}

impl DuplicateDetector {
    pub fn new(
        books: Arc<dyn BookRepository>,
        libraries: Arc<dyn LibraryRepository>,
        users: Arc<dyn UserRepository>,
        matching: KeyMatch,
    ) -> Self {
        Self {
            books,
            libraries,
            users,
            matching,
        }
    }

    /// Key comparison for one entity kind. Accounts are always matched
    /// case-insensitively, as at registration and login.
    pub fn matching(&self, kind: EntityKind) -> KeyMatch {
        match kind {
            EntityKind::User => KeyMatch::CaseInsensitive,
            EntityKind::Book | EntityKind::Library => self.matching,
        }
    }

    /// Id of the stored record sharing this row's natural key, if any.
    pub async fn find_existing(
        &self,
        kind: EntityKind,
        row: &TypedRow,
    ) -> Result<Option<i32>, DomainError> {
        let id = match kind {
            EntityKind::Book => {
                let isbn = row.text("isbn").unwrap_or_default();
                self.books
                    .find_by_isbn(&isbn, self.matching(kind))
                    .await?
                    .map(|b| b.id)
            }
            EntityKind::Library => {
                let name = row.text("name").unwrap_or_default();
                let address = row.text("address").unwrap_or_default();
                self.libraries
                    .find_by_name_and_address(&name, &address, self.matching(kind))
                    .await?
                    .map(|l| l.id)
            }
            EntityKind::User => {
                let email = row.text("email").unwrap_or_default();
                self.users
                    .find_by_email(&email, self.matching(kind))
                    .await?
                    .map(|u| u.id)
            }
        };
        Ok(id)
    }

    /// Whether a user row's username already belongs to a stored user.
    pub async fn username_taken(&self, row: &TypedRow) -> Result<bool, DomainError> {
        let Some(username) = row.text("username") else {
            return Ok(false);
        };
        Ok(self
            .users
            .find_by_username(&username, KeyMatch::CaseInsensitive)
            .await?
            .is_some())
    }
}
