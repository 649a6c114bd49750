pub mod api;
pub mod api_docs;
pub mod domain;
pub mod infrastructure;
pub mod jobs;
pub mod models;
pub mod services;
pub mod spreadsheet;

pub use infrastructure::auth;
pub use infrastructure::config;
pub use infrastructure::db;
pub use infrastructure::seed;
pub use infrastructure::server;
