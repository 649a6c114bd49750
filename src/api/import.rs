use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use utoipa::IntoParams;

use crate::api::error::ApiError;
use crate::auth::AdminClaims;
use crate::domain::EntityKind;
use crate::infrastructure::AppState;
use crate::jobs::JobSpec;
use crate::models::JobStatus;
use crate::services::{template, ExportFile, ImportError, ImportService};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Background job when the file has more data rows than the configured threshold
    #[default]
    Auto,
    Sync,
    Async,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImportParams {
    /// auto (default), sync or async
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub mode: ImportMode,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TemplateParams {
    /// Include one example row
    #[serde(default)]
    pub example: bool,
}

fn parse_kind(raw: &str) -> Result<EntityKind, ApiError> {
    raw.parse().map_err(ApiError::not_found)
}

fn upload_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new("PAYLOAD_TOO_LARGE", "Uploaded file exceeds the size limit")
    } else {
        ApiError::new("INVALID_FILE", e.body_text())
    }
}

struct Upload {
    bytes: Bytes,
    filename: Option<String>,
    content_type: Option<String>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok(Upload {
            bytes,
            filename,
            content_type,
        });
    }
    Err(ApiError::validation_error("Missing multipart field 'file'"))
}

/// Only receiving the body is time-limited; parsing and importing the rows
/// are not.
async fn within_upload_window<T>(
    limit: Duration,
    read: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::time::timeout(limit, read).await.map_err(|_| {
        ApiError::new(
            "UPLOAD_TIMEOUT",
            format!("Upload was not received within {}s", limit.as_secs()),
        )
    })?
}

/// Import a spreadsheet of books, libraries or users.
///
/// The admin check runs as an extractor ahead of `Multipart`, so refused
/// callers never have their upload read.
#[utoipa::path(
    post,
    path = "/api/admin/import/{kind}",
    params(
        ("kind" = String, Path, description = "books, libraries or users"),
        ImportParams
    ),
    responses(
        (status = 200, description = "Import report"),
        (status = 202, description = "Import queued as a background job"),
        (status = 400, description = "Missing required columns or unreadable file"),
        (status = 403, description = "Admin role required"),
        (status = 408, description = "Upload not received in time"),
        (status = 409, description = "Bulk insert conflict, nothing imported"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Unsupported file type")
    )
)]
pub async fn import_file(
    State(state): State<AppState>,
    AdminClaims(claims): AdminClaims,
    Path(kind): Path<String>,
    Query(params): Query<ImportParams>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let kind = parse_kind(&kind)?;

    let Upload {
        bytes,
        filename,
        content_type,
    } = within_upload_window(
        Duration::from_secs(state.config.upload_timeout_secs),
        read_upload(&mut multipart),
    )
    .await?;

    tracing::info!(
        kind = %kind,
        bytes = bytes.len(),
        "Import upload {} from {}",
        filename.as_deref().unwrap_or("(unnamed)"),
        claims.sub
    );

    let sheet = tokio::task::spawn_blocking(move || {
        ImportService::parse(&bytes, filename.as_deref(), content_type.as_deref())
    })
    .await
    .map_err(|e| ApiError::internal_error(format!("Could not read upload: {}", e)))??;

    // Header problems are reported now, not through a job
    kind.schema().resolve(&sheet.headers).map_err(ImportError::from)?;

    let background = match params.mode {
        ImportMode::Sync => false,
        ImportMode::Async => true,
        ImportMode::Auto => sheet.data_row_count() > state.config.async_import_row_threshold,
    };

    if background {
        let job_id = state
            .jobs
            .submit(
                JobSpec::Import {
                    kind,
                    sheet,
                    actor_id: Some(claims.uid),
                },
                Some(claims.uid),
            )
            .await?;
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "job_id": job_id, "status": JobStatus::Pending })),
        )
            .into_response());
    }

    let report = state.imports.import(kind, &sheet, Some(claims.uid)).await?;
    Ok(Json(report).into_response())
}

#[utoipa::path(
    get,
    path = "/api/admin/import/template/{kind}",
    params(
        ("kind" = String, Path, description = "books, libraries or users"),
        TemplateParams
    ),
    responses(
        (status = 200, description = "Import template workbook"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn import_template(
    _admin: AdminClaims,
    Path(kind): Path<String>,
    Query(params): Query<TemplateParams>,
) -> Result<ExportFile, ApiError> {
    let kind = parse_kind(&kind)?;
    template(kind, params.example).map_err(|e| {
        tracing::error!("Template generation failed: {}", e);
        ApiError::internal_error("Template generation failed")
    })
}
