use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::domain::{DomainError, JobRepository};

pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

/// Fail jobs a previous process left pending or running; their payloads
/// were lost with it.
pub async fn recover_interrupted(repo: &dyn JobRepository) -> Result<u64, DomainError> {
    let recovered = repo.fail_unfinished(INTERRUPTED_BY_RESTART).await?;
    if recovered > 0 {
        tracing::warn!(jobs = recovered, "Marked interrupted jobs as failed");
    }
    Ok(recovered)
}

/// Delete finished jobs older than `retention` together with any export
/// files they produced.
pub async fn purge_expired(
    repo: &dyn JobRepository,
    retention: chrono::Duration,
) -> Result<usize, DomainError> {
    let cutoff = chrono::Utc::now() - retention;
    let expired = repo.delete_finished_before(cutoff).await?;

    for job in &expired {
        let Some(path) = job.export_path() else {
            continue;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(job_id = %job.id, "Removed export file {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(job_id = %job.id, "Could not remove {}: {}", path.display(), e),
        }
    }

    if !expired.is_empty() {
        tracing::info!(jobs = expired.len(), "Purged expired jobs");
    }
    Ok(expired.len())
}

/// Periodic purge of expired jobs.
pub fn spawn_maintenance(
    repo: Arc<dyn JobRepository>,
    retention_days: i64,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_expired(repo.as_ref(), chrono::Duration::days(retention_days)).await
            {
                tracing::error!("Job maintenance failed: {}", e);
            }
        }
    })
}
