//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{BookRepository, JobRepository, LibraryRepository, UserRepository};
use crate::infrastructure::config::Config;
use crate::infrastructure::{
    SeaOrmBookRepository, SeaOrmJobRepository, SeaOrmLibraryRepository, SeaOrmUserRepository,
};
use crate::jobs::{JobContext, JobDispatcher};
use crate::services::{DuplicateDetector, ExportService, ImportService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Arc<Config>,
    pub book_repo: Arc<dyn BookRepository>,
    pub library_repo: Arc<dyn LibraryRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub job_repo: Arc<dyn JobRepository>,
    pub imports: ImportService,
    pub exports: ExportService,
    /// Background job dispatcher (owns the worker pool)
    pub jobs: JobDispatcher,
}

impl AppState {
    /// Create a new AppState with all repositories initialized and the job
    /// worker pool running. Must be called inside a Tokio runtime.
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let book_repo: Arc<dyn BookRepository> = Arc::new(SeaOrmBookRepository::new(db.clone()));
        let library_repo: Arc<dyn LibraryRepository> =
            Arc::new(SeaOrmLibraryRepository::new(db.clone()));
        let user_repo: Arc<dyn UserRepository> = Arc::new(SeaOrmUserRepository::new(db.clone()));
        let job_repo: Arc<dyn JobRepository> = Arc::new(SeaOrmJobRepository::new(db.clone()));

        let detector = DuplicateDetector::new(
            book_repo.clone(),
            library_repo.clone(),
            user_repo.clone(),
            config.duplicate_matching,
        );
        let imports = ImportService::new(
            book_repo.clone(),
            library_repo.clone(),
            user_repo.clone(),
            detector,
        );
        let exports = ExportService::new(book_repo.clone(), library_repo.clone(), user_repo.clone());

        let jobs = JobDispatcher::start(
            job_repo.clone(),
            JobContext {
                imports: imports.clone(),
                exports: exports.clone(),
                export_dir: config.export_dir.clone(),
            },
            config.job_workers,
            Duration::from_secs(config.job_timeout_secs),
        );

        Self {
            db,
            config: Arc::new(config),
            book_repo,
            library_repo,
            user_repo,
            job_repo,
            imports,
            exports,
            jobs,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
