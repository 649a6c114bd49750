//! Repository implementations using SeaORM

pub mod book_repository;
pub mod job_repository;
pub mod library_repository;
pub mod user_repository;

pub use book_repository::SeaOrmBookRepository;
pub use job_repository::SeaOrmJobRepository;
pub use library_repository::SeaOrmLibraryRepository;
pub use user_repository::SeaOrmUserRepository;

use sea_orm::sea_query::SimpleExpr;
use sea_orm::ColumnTrait;

use crate::domain::{fold_key, KeyMatch};

/// Rows per INSERT statement during bulk creation (keeps SQLite under its
/// bound-parameter limit).
pub(crate) const BULK_CHUNK: usize = 100;

/// Equality on a natural key. Exact matching compares the stored value;
/// case-insensitive matching compares the folded `*_key` column written
/// next to it.
pub(crate) fn key_eq<C: ColumnTrait>(
    column: C,
    key_column: C,
    value: &str,
    matching: KeyMatch,
) -> SimpleExpr {
    match matching {
        KeyMatch::Exact => column.eq(value.trim()),
        KeyMatch::CaseInsensitive => key_column.eq(fold_key(value)),
    }
}
