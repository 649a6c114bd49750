use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::error::ApiError;
use crate::auth::{AdminClaims, Claims};
use crate::infrastructure::AppState;
use crate::services::{ExportFile, ExportFormat, ExportTarget, OwnedExport};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportParams {
    /// xlsx (default) or csv
    pub format: Option<String>,
}

impl ExportParams {
    fn format(&self) -> Result<ExportFormat, ApiError> {
        match &self.format {
            Some(f) => f.parse().map_err(ApiError::validation_error),
            None => Ok(ExportFormat::default()),
        }
    }
}

/// Send generated bytes as a file download.
pub(crate) fn attachment(bytes: Vec<u8>, filename: &str, content_type: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

impl IntoResponse for ExportFile {
    fn into_response(self) -> Response {
        attachment(self.bytes, &self.filename, self.content_type)
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/export/{target}",
    params(
        ("target" = String, Path, description = "books, libraries, users or complete-report"),
        ExportParams
    ),
    responses(
        (status = 200, description = "Exported file"),
        (status = 400, description = "Unknown target or unsupported format"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn export_records(
    State(state): State<AppState>,
    AdminClaims(claims): AdminClaims,
    Path(target): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<ExportFile, ApiError> {
    let target: ExportTarget = target.parse().map_err(ApiError::validation_error)?;
    let format = params.format()?;

    tracing::info!("Export of {} as {} requested by {}", target, format.extension(), claims.sub);
    Ok(state.exports.export(target, format).await?)
}

/// Export the caller's own books, libraries, or everything they own
/// together with their profile.
#[utoipa::path(
    get,
    path = "/api/user/export/{what}",
    params(
        ("what" = String, Path, description = "my-books, my-libraries or my-data"),
        ExportParams
    ),
    responses(
        (status = 200, description = "Exported file"),
        (status = 400, description = "Unsupported format"),
        (status = 404, description = "Unknown export")
    )
)]
pub async fn export_own(
    State(state): State<AppState>,
    claims: Claims,
    Path(what): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<ExportFile, ApiError> {
    let what: OwnedExport = what.parse().map_err(ApiError::not_found)?;
    let format = params.format()?;
    let owner = state
        .user_repo
        .find_by_id(claims.uid)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!("Export of {} requested by {}", what.as_str(), claims.sub);
    Ok(state.exports.export_owned(&owner, what, format).await?)
}
