pub mod book;
pub mod book_library;
pub mod job;
pub mod library;
pub mod user;

pub use book::Book;
pub use job::{JobKind, JobRecord, JobStatus};
pub use library::Library;
pub use user::{Role, User};
