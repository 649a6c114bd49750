use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::KeyMatch;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Upload size cap for import requests
    pub max_upload_bytes: usize,
    pub upload_timeout_secs: u64,
    /// Imports with more data rows than this run as background jobs
    pub async_import_row_threshold: usize,
    pub job_workers: usize,
    pub job_timeout_secs: u64,
    pub export_dir: PathBuf,
    pub duplicate_matching: KeyMatch,
    pub job_retention_days: i64,
    pub maintenance_interval_secs: u64,
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://libris.db?mode=rwc".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            max_upload_bytes: 10 * 1024 * 1024,
            upload_timeout_secs: 60,
            async_import_row_threshold: 500,
            job_workers: 2,
            job_timeout_secs: 1800,
            export_dir: PathBuf::from("exports"),
            duplicate_matching: KeyMatch::CaseInsensitive,
            job_retention_days: 7,
            maintenance_interval_secs: 3600,
            seed_demo: false,
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port: parsed("PORT", defaults.port),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(Vec::new),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            upload_timeout_secs: parsed("UPLOAD_TIMEOUT_SECS", defaults.upload_timeout_secs),
            async_import_row_threshold: parsed(
                "ASYNC_IMPORT_ROW_THRESHOLD",
                defaults.async_import_row_threshold,
            ),
            job_workers: parsed("JOB_WORKERS", defaults.job_workers).max(1),
            job_timeout_secs: parsed("JOB_TIMEOUT_SECS", defaults.job_timeout_secs),
            export_dir: env::var("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            duplicate_matching: parsed("DUPLICATE_MATCHING", defaults.duplicate_matching),
            job_retention_days: parsed("JOB_RETENTION_DAYS", defaults.job_retention_days),
            maintenance_interval_secs: parsed(
                "MAINTENANCE_INTERVAL_SECS",
                defaults.maintenance_interval_secs,
            )
            .max(1),
            seed_demo: flag("SEED_DEMO"),
        }
    }
}
