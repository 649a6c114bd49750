//! Column schema for each importable entity kind.
//!
//! This is the single definition read by the importer (header resolution and
//! row validation), the template generator and the exporter. Column order here
//! is the column order of every template and every export.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[serde(rename = "books")]
    Book,
    #[serde(rename = "libraries")]
    Library,
    #[serde(rename = "users")]
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Book, EntityKind::Library, EntityKind::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Book => "books",
            EntityKind::Library => "libraries",
            EntityKind::User => "users",
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            EntityKind::Book => &BOOKS,
            EntityKind::Library => &LIBRARIES,
            EntityKind::User => &USERS,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "book" | "books" => Ok(EntityKind::Book),
            "library" | "libraries" => Ok(EntityKind::Library),
            "user" | "users" => Ok(EntityKind::User),
            other => Err(format!("Unknown entity type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Email,
    Boolean,
    Role,
}

#[derive(Debug)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub required: bool,
    pub field_type: FieldType,
    /// Part of the natural key used for duplicate detection
    pub natural_key: bool,
    /// Unique on its own, outside the natural key (checked but never a duplicate)
    pub unique: bool,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub example: &'static str,
}

impl ColumnSpec {
    const fn new(name: &'static str, field_type: FieldType, example: &'static str) -> Self {
        Self {
            name,
            required: false,
            field_type,
            natural_key: false,
            unique: false,
            min: None,
            max: None,
            example,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn key(mut self) -> Self {
        self.natural_key = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub sheet_name: &'static str,
    pub columns: &'static [ColumnSpec],
}

static BOOKS: EntitySchema = EntitySchema {
    kind: EntityKind::Book,
    sheet_name: "Books",
    columns: &[
        ColumnSpec::new("title", FieldType::Text, "The Left Hand of Darkness").required(),
        ColumnSpec::new("author", FieldType::Text, "Ursula K. Le Guin").required(),
        ColumnSpec::new("isbn", FieldType::Text, "978-0441478125")
            .required()
            .key(),
        ColumnSpec::new("published_year", FieldType::Integer, "1969").range(0, 9999),
        ColumnSpec::new("description", FieldType::Text, "Winter, a planet of ambisexual people"),
    ],
};

static LIBRARIES: EntitySchema = EntitySchema {
    kind: EntityKind::Library,
    sheet_name: "Libraries",
    columns: &[
        ColumnSpec::new("name", FieldType::Text, "Central Library")
            .required()
            .key(),
        ColumnSpec::new("address", FieldType::Text, "1 Main Street, Springfield")
            .required()
            .key(),
        ColumnSpec::new("description", FieldType::Text, "Main branch"),
    ],
};

static USERS: EntitySchema = EntitySchema {
    kind: EntityKind::User,
    sheet_name: "Users",
    columns: &[
        ColumnSpec::new("email", FieldType::Email, "reader@example.com")
            .required()
            .key(),
        ColumnSpec::new("username", FieldType::Text, "reader")
            .required()
            .unique(),
        ColumnSpec::new("full_name", FieldType::Text, "Avid Reader"),
        ColumnSpec::new("role", FieldType::Role, "member"),
        ColumnSpec::new("is_active", FieldType::Boolean, "true"),
        ColumnSpec::new("is_verified", FieldType::Boolean, "false"),
    ],
};

/// Required columns absent from an uploaded header row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Missing required columns: {}", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

/// Position of each schema column in an uploaded header row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    positions: Vec<Option<usize>>,
}

impl ColumnMap {
    /// File position of the schema column at `index`, if the file has it.
    pub fn position(&self, index: usize) -> Option<usize> {
        self.positions.get(index).copied().flatten()
    }
}

/// Trim, lowercase, and fold whitespace and dashes into underscores.
pub fn normalize_header(raw: &str) -> String {
    let cleaned = raw.trim_start_matches('\u{feff}').trim().to_lowercase();
    let mut out = String::with_capacity(cleaned.len());
    let mut last_was_sep = false;
    for ch in cleaned.chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            if !last_was_sep {
                out.push('_');
            }
            last_was_sep = true;
        } else {
            out.push(ch);
            last_was_sep = false;
        }
    }
    out
}

impl EntitySchema {
    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn natural_key_columns(&self) -> impl Iterator<Item = &'static ColumnSpec> {
        self.columns.iter().filter(|c| c.natural_key)
    }

    /// Human-readable natural key, e.g. `isbn` or `name+address`.
    pub fn key_label(&self) -> String {
        self.natural_key_columns()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Match an uploaded header row against this schema.
    ///
    /// Unknown columns are ignored; the first occurrence of a repeated
    /// column wins.
    pub fn resolve(&self, headers: &[String]) -> Result<ColumnMap, SchemaError> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

        let positions: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|column| normalized.iter().position(|h| h == column.name))
            .collect();

        let missing: Vec<String> = self
            .columns
            .iter()
            .zip(&positions)
            .filter(|(column, position)| column.required && position.is_none())
            .map(|(column, _)| column.name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(ColumnMap { positions })
        } else {
            Err(SchemaError { missing })
        }
    }
}
