//! Durable job status records.
//!
//! The `jobs` table is the only channel between the dispatcher and a polling
//! caller: submit writes a `pending` row, the worker moves it through
//! `running` to `succeeded` or `failed`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub target: String,
    pub status: String,
    pub submitted_by: Option<i32>,
    pub result: Option<String>, // JSON document
    pub error: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Import,
    Export,
    Statistics,
    HealthCheck,
    LibraryReport,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Import => "import",
            JobKind::Export => "export",
            JobKind::Statistics => "statistics",
            JobKind::HealthCheck => "health_check",
            JobKind::LibraryReport => "library_report",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "import" => Ok(JobKind::Import),
            "export" => Ok(JobKind::Export),
            "statistics" => Ok(JobKind::Statistics),
            "health_check" => Ok(JobKind::HealthCheck),
            "library_report" => Ok(JobKind::LibraryReport),
            _ => Err(format!("Invalid job kind: {}", s)),
        }
    }
}

/// Job record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub target: String,
    pub status: JobStatus,
    pub submitted_by: Option<i32>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl JobRecord {
    /// Location of the file produced by a finished export job.
    pub fn export_path(&self) -> Option<PathBuf> {
        if self.kind != JobKind::Export {
            return None;
        }
        self.result
            .as_ref()
            .and_then(|r| r.get("file"))
            .and_then(|f| f.as_str())
            .map(PathBuf::from)
    }
}

impl TryFrom<Model> for JobRecord {
    type Error = String;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&model.id).map_err(|e| format!("Invalid job id: {}", e))?;
        let result = match model.result {
            Some(raw) => Some(
                serde_json::from_str(&raw).map_err(|e| format!("Invalid job result: {}", e))?,
            ),
            None => None,
        };

        Ok(Self {
            id,
            kind: model.kind.parse()?,
            target: model.target,
            status: model.status.parse()?,
            submitted_by: model.submitted_by,
            result,
            error: model.error,
            attempts: model.attempts,
            max_attempts: model.max_attempts,
            created_at: model.created_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(kind: &str, status: &str, result: Option<&str>) -> Model {
        Model {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            target: "books".to_string(),
            status: status.to_string(),
            submitted_by: Some(1),
            result: result.map(str::to_string),
            error: None,
            attempts: 1,
            max_attempts: 1,
            created_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_job_status_round_trips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!("RUNNING".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_only_terminal_statuses_are_finished() {
        assert!(!JobStatus::Pending.is_finished());
        assert!(!JobStatus::Running.is_finished());
        assert!(JobStatus::Succeeded.is_finished());
        assert!(JobStatus::Failed.is_finished());
    }

    #[test]
    fn test_record_exposes_export_path() {
        let record = JobRecord::try_from(model(
            "export",
            "succeeded",
            Some(r#"{"file":"exports/abc.xlsx","filename":"books.xlsx"}"#),
        ))
        .unwrap();
        assert_eq!(record.export_path(), Some(PathBuf::from("exports/abc.xlsx")));

        let import = JobRecord::try_from(model("import", "succeeded", Some(r#"{"file":"x"}"#)))
            .unwrap();
        assert_eq!(import.export_path(), None);
    }

    #[test]
    fn test_record_rejects_unknown_kind() {
        assert!(JobRecord::try_from(model("reindex", "pending", None)).is_err());
    }
}
