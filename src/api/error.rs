use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::DomainError;
use crate::jobs::JobError;
use crate::services::{ExportError, ImportError};

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "SCHEMA_ERROR" | "INVALID_FILE" => StatusCode::BAD_REQUEST,
            "CONFLICT" | "BULK_INSERT_CONFLICT" | "JOB_FINISHED" => StatusCode::CONFLICT,
            "UNSUPPORTED_FILE_TYPE" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "UPLOAD_TIMEOUT" => StatusCode::REQUEST_TIMEOUT,
            "QUEUE_FULL" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => ApiError::not_found("Resource not found"),
            DomainError::Validation(msg) => ApiError::validation_error(msg),
            DomainError::Conflict(msg) => ApiError::conflict(msg),
            DomainError::Database(msg) | DomainError::Internal(msg) => {
                tracing::error!("Request failed: {}", msg);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Schema(schema) => ApiError::with_details(
                "SCHEMA_ERROR",
                schema.to_string(),
                json!({ "missing_columns": schema.missing }),
            ),
            ImportError::UnsupportedFileType(name) => ApiError::new(
                "UNSUPPORTED_FILE_TYPE",
                format!("Unsupported file type: {} (expected .csv, .xlsx, .xls or .ods)", name),
            ),
            ImportError::Parse(e) => ApiError::new("INVALID_FILE", e.to_string()),
            ImportError::BulkInsert { conflict: true, message } => ApiError::with_details(
                "BULK_INSERT_CONFLICT",
                "Import rolled back: a record was created concurrently",
                json!({ "cause": message }),
            ),
            ImportError::BulkInsert { conflict: false, message } => {
                tracing::error!("Bulk insert failed: {}", message);
                ApiError::new("BULK_INSERT_FAILED", "Import rolled back: bulk insert failed")
            }
            ImportError::Store(e) => e.into(),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::UnsupportedFormat(msg) => ApiError::validation_error(msg),
            ExportError::Store(e) => e.into(),
            other => {
                tracing::error!("Export failed: {}", other);
                ApiError::new("EXPORT_FAILED", "Export failed")
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::NotFound => ApiError::not_found("Job not found"),
            JobError::AlreadyFinished => ApiError::new("JOB_FINISHED", "Job has already finished"),
            JobError::QueueFull => ApiError::new("QUEUE_FULL", "Job queue is full, retry later"),
            JobError::Store(e) => e.into(),
        }
    }
}
