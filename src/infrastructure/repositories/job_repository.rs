//! SeaORM implementation of JobRepository

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::domain::{DomainError, JobRepository, NewJob};
use crate::models::job::{ActiveModel, Column, Entity as JobEntity, Model};
use crate::models::{JobRecord, JobStatus};

/// SeaORM-based implementation of JobRepository
pub struct SeaOrmJobRepository {
    db: DatabaseConnection,
}

impl SeaOrmJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_record(model: Model) -> Result<JobRecord, DomainError> {
    JobRecord::try_from(model).map_err(DomainError::Internal)
}

/// Fixed-width UTC timestamps, so stored values order correctly as text.
fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn unfinished() -> [&'static str; 2] {
    [JobStatus::Pending.as_str(), JobStatus::Running.as_str()]
}

#[async_trait]
impl JobRepository for SeaOrmJobRepository {
    async fn create(&self, input: NewJob) -> Result<JobRecord, DomainError> {
        let job = ActiveModel {
            id: Set(input.id.to_string()),
            kind: Set(input.kind),
            target: Set(input.target),
            status: Set(JobStatus::Pending.as_str().to_string()),
            submitted_by: Set(input.submitted_by),
            result: Set(None),
            error: Set(None),
            attempts: Set(0),
            max_attempts: Set(1),
            created_at: Set(timestamp(chrono::Utc::now())),
            started_at: Set(None),
            finished_at: Set(None),
        };

        to_record(job.insert(&self.db).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JobRecord>, DomainError> {
        JobEntity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(to_record)
            .transpose()
    }

    async fn list(&self, limit: u64) -> Result<Vec<JobRecord>, DomainError> {
        JobEntity::find()
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_record)
            .collect()
    }

    async fn mark_running(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = JobEntity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Running.as_str()))
            .col_expr(Column::StartedAt, Expr::value(timestamp(chrono::Utc::now())))
            .col_expr(Column::Attempts, Expr::col(Column::Attempts).add(1))
            .filter(Column::Id.eq(id.to_string()))
            .filter(Column::Status.eq(JobStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn mark_succeeded(&self, id: Uuid, result: serde_json::Value) -> Result<(), DomainError> {
        // A job cancelled while running keeps its failed status
        JobEntity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Succeeded.as_str()))
            .col_expr(Column::Result, Expr::value(result.to_string()))
            .col_expr(Column::FinishedAt, Expr::value(timestamp(chrono::Utc::now())))
            .filter(Column::Id.eq(id.to_string()))
            .filter(Column::Status.eq(JobStatus::Running.as_str()))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool, DomainError> {
        let result = JobEntity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Failed.as_str()))
            .col_expr(Column::Error, Expr::value(error))
            .col_expr(Column::FinishedAt, Expr::value(timestamp(chrono::Utc::now())))
            .filter(Column::Id.eq(id.to_string()))
            .filter(Column::Status.is_in(unfinished()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn fail_unfinished(&self, error: &str) -> Result<u64, DomainError> {
        let result = JobEntity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Failed.as_str()))
            .col_expr(Column::Error, Expr::value(error))
            .col_expr(Column::FinishedAt, Expr::value(timestamp(chrono::Utc::now())))
            .filter(Column::Status.is_in(unfinished()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn delete_finished_before(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<JobRecord>, DomainError> {
        let expired = JobEntity::find()
            .filter(Column::Status.is_not_in(unfinished()))
            .filter(Column::FinishedAt.lt(timestamp(cutoff)))
            .all(&self.db)
            .await?;

        if expired.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = expired.iter().map(|job| job.id.clone()).collect();
        JobEntity::delete_many()
            .filter(Column::Id.is_in(ids))
            .exec(&self.db)
            .await?;

        expired.into_iter().map(to_record).collect()
    }
}
