use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::worker::{run_pool, JobContext};
use crate::domain::{DomainError, EntityKind, JobRepository, NewJob};
use crate::models::{JobKind, JobRecord};
use crate::services::{ExportFormat, ExportTarget};
use crate::spreadsheet::RawSheet;

/// Jobs waiting for a worker beyond this are refused.
const QUEUE_CAPACITY: usize = 256;

pub const CANCELLED_BY_OPERATOR: &str = "cancelled by operator";

/// Work a job performs. Payloads live in memory only; the `jobs` table
/// records status and results.
#[derive(Debug, Clone)]
pub enum JobSpec {
    Import {
        kind: EntityKind,
        sheet: RawSheet,
        actor_id: Option<i32>,
    },
    Export {
        target: ExportTarget,
        format: ExportFormat,
    },
    Statistics,
    HealthCheck,
    /// Holdings of one library
    LibraryReport {
        library_id: i32,
    },
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::Import { .. } => JobKind::Import,
            JobSpec::Export { .. } => JobKind::Export,
            JobSpec::Statistics => JobKind::Statistics,
            JobSpec::HealthCheck => JobKind::HealthCheck,
            JobSpec::LibraryReport { .. } => JobKind::LibraryReport,
        }
    }

    pub fn target(&self) -> String {
        match self {
            JobSpec::Import { kind, .. } => kind.to_string(),
            JobSpec::Export { target, format } => format!("{}.{}", target, format.extension()),
            JobSpec::Statistics => "catalog".to_string(),
            JobSpec::HealthCheck => "store".to_string(),
            JobSpec::LibraryReport { library_id } => format!("library:{}", library_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job not found")]
    NotFound,
    #[error("Job has already finished")]
    AlreadyFinished,
    #[error("Job queue is full")]
    QueueFull,
    #[error(transparent)]
    Store(#[from] DomainError),
}

pub(crate) struct QueuedJob {
    pub id: Uuid,
    pub spec: JobSpec,
}

/// Hands work to the background worker pool and answers status queries.
#[derive(Clone)]
pub struct JobDispatcher {
    repo: Arc<dyn JobRepository>,
    queue: mpsc::Sender<QueuedJob>,
    running: Arc<DashMap<Uuid, AbortHandle>>,
}

impl JobDispatcher {
    /// Spawn the worker pool and return a handle for submitting to it.
    pub fn start(
        repo: Arc<dyn JobRepository>,
        context: JobContext,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        let (queue, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let running = Arc::new(DashMap::new());

        tokio::spawn(run_pool(
            receiver,
            repo.clone(),
            Arc::new(context),
            running.clone(),
            workers,
            timeout,
        ));

        Self {
            repo,
            queue,
            running,
        }
    }

    /// Record a pending job and queue it. Returns immediately.
    pub async fn submit(&self, spec: JobSpec, submitted_by: Option<i32>) -> Result<Uuid, JobError> {
        let id = Uuid::new_v4();
        let kind = spec.kind();

        self.repo
            .create(NewJob {
                id,
                kind: kind.to_string(),
                target: spec.target(),
                submitted_by,
            })
            .await?;

        if self.queue.try_send(QueuedJob { id, spec }).is_err() {
            tracing::warn!(job_id = %id, kind = %kind, "Job queue full, refusing job");
            self.repo.mark_failed(id, "job queue is full").await?;
            return Err(JobError::QueueFull);
        }

        tracing::info!(job_id = %id, kind = %kind, "Job submitted");
        Ok(id)
    }

    pub async fn status(&self, id: Uuid) -> Result<JobRecord, JobError> {
        self.repo.find_by_id(id).await?.ok_or(JobError::NotFound)
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<JobRecord>, JobError> {
        Ok(self.repo.list(limit).await?)
    }

    /// Operator cancellation: the job ends as failed. A running task is
    /// aborted; a pending one is skipped when a worker reaches it.
    pub async fn cancel(&self, id: Uuid) -> Result<JobRecord, JobError> {
        let record = self.status(id).await?;
        if record.status.is_finished() || !self.repo.mark_failed(id, CANCELLED_BY_OPERATOR).await? {
            return Err(JobError::AlreadyFinished);
        }

        if let Some((_, handle)) = self.running.remove(&id) {
            handle.abort();
        }
        tracing::info!(job_id = %id, "Job cancelled by operator");

        self.status(id).await
    }
}
