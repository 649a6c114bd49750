//! Worker pool executing queued jobs.
//!
//! One loop receives jobs in submission order and spawns each under a
//! semaphore permit, so at most `workers` jobs run at once.

use dashmap::DashMap;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::dispatcher::{JobSpec, QueuedJob};
use crate::domain::{DomainError, JobRepository};
use crate::services::{ExportService, ImportService};

/// What job execution needs from the rest of the application.
#[derive(Clone)]
pub struct JobContext {
    pub imports: ImportService,
    pub exports: ExportService,
    pub export_dir: PathBuf,
}

pub(crate) async fn run_pool(
    mut receiver: mpsc::Receiver<QueuedJob>,
    repo: Arc<dyn JobRepository>,
    context: Arc<JobContext>,
    running: Arc<DashMap<Uuid, AbortHandle>>,
    workers: usize,
    timeout: Duration,
) {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    info!(workers, timeout_secs = timeout.as_secs(), "Job worker pool started");

    while let Some(job) = receiver.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        let id = job.id;
        let repo = repo.clone();
        let context = context.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            execute(job, repo, context, timeout).await;
        });

        running.insert(id, task.abort_handle());
        let running = running.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await
                && e.is_cancelled()
            {
                debug!(job_id = %id, "Job task aborted");
            }
            running.remove(&id);
        });
    }

    info!("Job worker pool stopped");
}

async fn execute(
    job: QueuedJob,
    repo: Arc<dyn JobRepository>,
    context: Arc<JobContext>,
    timeout: Duration,
) {
    let id = job.id;
    let kind = job.spec.kind();

    match repo.mark_running(id).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(job_id = %id, kind = %kind, "Job no longer pending, skipping");
            return;
        }
        Err(e) => {
            error!(job_id = %id, kind = %kind, "Could not start job: {}", e);
            return;
        }
    }

    info!(job_id = %id, kind = %kind, "Job started");
    let started = Instant::now();

    let outcome = match tokio::time::timeout(timeout, run(id, job.spec, &repo, &context)).await {
        Ok(Ok(result)) => {
            info!(
                job_id = %id,
                kind = %kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job succeeded"
            );
            repo.mark_succeeded(id, result).await
        }
        Ok(Err(message)) => {
            warn!(job_id = %id, kind = %kind, "Job failed: {}", message);
            repo.mark_failed(id, &message).await.map(|_| ())
        }
        Err(_) => {
            warn!(job_id = %id, kind = %kind, "Job timed out");
            repo.mark_failed(id, &format!("timed out after {:?}", timeout))
                .await
                .map(|_| ())
        }
    };

    if let Err(e) = outcome {
        error!(job_id = %id, "Could not record job outcome: {}", e);
    }
}

async fn run(
    id: Uuid,
    spec: JobSpec,
    repo: &Arc<dyn JobRepository>,
    context: &JobContext,
) -> Result<serde_json::Value, String> {
    match spec {
        JobSpec::Import {
            kind,
            sheet,
            actor_id,
        } => {
            let report = context
                .imports
                .import(kind, &sheet, actor_id)
                .await
                .map_err(|e| e.to_string())?;
            serde_json::to_value(report).map_err(|e| e.to_string())
        }
        JobSpec::Export { target, format } => {
            let file = context
                .exports
                .export(target, format)
                .await
                .map_err(|e| e.to_string())?;

            tokio::fs::create_dir_all(&context.export_dir)
                .await
                .map_err(|e| format!("Could not create export directory: {}", e))?;
            let path = context
                .export_dir
                .join(format!("{}.{}", id, format.extension()));
            tokio::fs::write(&path, &file.bytes)
                .await
                .map_err(|e| format!("Could not write export file: {}", e))?;

            Ok(json!({
                "file": path.to_string_lossy(),
                "filename": file.filename,
                "content_type": file.content_type,
                "bytes": file.bytes.len(),
            }))
        }
        JobSpec::Statistics => {
            let stats = context
                .exports
                .statistics()
                .await
                .map_err(|e| e.to_string())?;
            serde_json::to_value(stats).map_err(|e| e.to_string())
        }
        JobSpec::LibraryReport { library_id } => {
            let report = match context.exports.library_report(library_id).await {
                Ok(report) => report,
                Err(DomainError::NotFound) => {
                    return Err(format!("Library {} not found", library_id));
                }
                Err(e) => return Err(e.to_string()),
            };
            info!(
                job_id = %id,
                library_id,
                books = report.total_books,
                "Library report generated"
            );
            serde_json::to_value(report).map_err(|e| e.to_string())
        }
        JobSpec::HealthCheck => {
            let started = Instant::now();
            // Reads this job's own status row back from the store
            repo.find_by_id(id)
                .await
                .map_err(|e| e.to_string())?
                .ok_or("job row missing from store")?;
            Ok(json!({
                "store": "ok",
                "latency_ms": started.elapsed().as_millis() as u64,
            }))
        }
    }
}
