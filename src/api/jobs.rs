use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::export::attachment;
use crate::api::error::ApiError;
use crate::auth::{AdminClaims, Claims};
use crate::infrastructure::AppState;
use crate::jobs::JobSpec;
use crate::models::{JobRecord, JobStatus};
use crate::services::{ExportFormat, ExportTarget};

const DEFAULT_JOB_LIST_LIMIT: u64 = 50;

/// Jobs that can be submitted directly. Imports are submitted through the
/// upload endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobRequest {
    Export {
        target: String,
        #[serde(default)]
        format: Option<String>,
    },
    Statistics,
    HealthCheck,
    LibraryReport {
        library_id: i32,
    },
}

impl JobRequest {
    fn into_spec(self) -> Result<JobSpec, ApiError> {
        Ok(match self {
            JobRequest::Export { target, format } => JobSpec::Export {
                target: target
                    .parse::<ExportTarget>()
                    .map_err(ApiError::validation_error)?,
                format: match format {
                    Some(f) => f.parse().map_err(ApiError::validation_error)?,
                    None => ExportFormat::default(),
                },
            },
            JobRequest::Statistics => JobSpec::Statistics,
            JobRequest::HealthCheck => JobSpec::HealthCheck,
            JobRequest::LibraryReport { library_id } => JobSpec::LibraryReport { library_id },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JobListParams {
    pub limit: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/admin/jobs",
    responses(
        (status = 202, description = "Job queued"),
        (status = 400, description = "Invalid job request"),
        (status = 404, description = "Library of a report job not found"),
        (status = 503, description = "Job queue is full")
    )
)]
pub async fn submit_job(
    State(state): State<AppState>,
    AdminClaims(claims): AdminClaims,
    Json(request): Json<JobRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let spec = request.into_spec()?;
    if let JobSpec::Export {
        target: ExportTarget::CompleteReport,
        format: ExportFormat::Csv,
    } = spec
    {
        return Err(ApiError::validation_error(
            "The complete report is only available as xlsx",
        ));
    }
    if let JobSpec::LibraryReport { library_id } = &spec
        && state.library_repo.find_by_id(*library_id).await?.is_none()
    {
        return Err(ApiError::not_found("Library not found"));
    }

    let job_id = state.jobs.submit(spec, Some(claims.uid)).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "status": JobStatus::Pending })),
    ))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    _admin: AdminClaims,
    Query(params): Query<JobListParams>,
) -> Result<Json<Value>, ApiError> {
    let jobs = state
        .jobs
        .list(params.limit.unwrap_or(DEFAULT_JOB_LIST_LIMIT))
        .await?;
    Ok(Json(json!({ "jobs": jobs })))
}

#[utoipa::path(
    post,
    path = "/api/admin/jobs/{id}/cancel",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job cancelled"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job has already finished")
    )
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    AdminClaims(claims): AdminClaims,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRecord>, ApiError> {
    let record = state.jobs.cancel(id).await?;
    tracing::info!(job_id = %id, "Job cancelled by {}", claims.sub);
    Ok(Json(record))
}

/// Members see only their own jobs; admins see all of them.
async fn visible_job(state: &AppState, claims: &Claims, id: Uuid) -> Result<JobRecord, ApiError> {
    let record = state.jobs.status(id).await?;
    if !claims.is_admin() && record.submitted_by != Some(claims.uid) {
        return Err(ApiError::not_found("Job not found"));
    }
    Ok(record)
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job status and result"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn job_status(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRecord>, ApiError> {
    Ok(Json(visible_job(&state, &claims, id).await?))
}

/// File produced by a succeeded export job.
pub async fn download_export(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = visible_job(&state, &claims, id).await?;
    match record.status {
        JobStatus::Succeeded => {}
        JobStatus::Failed => return Err(ApiError::not_found("Job failed without producing a file")),
        JobStatus::Pending | JobStatus::Running => {
            return Err(ApiError::conflict("Job has not finished yet"));
        }
    }

    let path = record
        .export_path()
        .ok_or_else(|| ApiError::not_found("Job did not produce a file"))?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::warn!(job_id = %id, "Export file {} unavailable: {}", path.display(), e);
        ApiError::not_found("Export file is no longer available")
    })?;

    let result = record.result.unwrap_or_default();
    let filename = result
        .get("filename")
        .and_then(Value::as_str)
        .unwrap_or("export");
    let content_type = result
        .get("content_type")
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream");

    Ok(attachment(bytes, filename, content_type))
}
