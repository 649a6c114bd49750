//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no Axum).
//! Trait definitions, the shared column schema and domain error types.

pub mod errors;
pub mod repositories;
pub mod schema;

pub use errors::DomainError;
pub use repositories::*;
pub use schema::{ColumnSpec, EntityKind, EntitySchema, FieldType, SchemaError};
