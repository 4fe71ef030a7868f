//! Job repository
//!
//! Handles all storage operations related to jobs. Inserts are idempotent by
//! ledger job id, and every status change is a compare-and-set against the
//! status it is expected to leave, so a job can only ever move along
//! `PENDING -> IN_PROGRESS -> COMPLETED | FAILED`.

use async_trait::async_trait;
use cloakx_core::domain::job::{Job, JobId, JobStatus, NewJob};
use sqlx::PgPool;

use super::StoreError;

/// Repository trait for job records
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts a job unless one with the same id already exists
    ///
    /// # Returns
    /// The stored job when it was newly inserted, `None` when the id was
    /// already known (the existing row is left untouched)
    async fn insert_if_absent(&self, job: NewJob) -> Result<Option<Job>, StoreError>;

    /// Finds a job by id
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Lists jobs, optionally filtered by status, oldest first
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, StoreError>;

    /// Moves a job from `PENDING` to `IN_PROGRESS`
    ///
    /// # Returns
    /// `false` when the job was not pending
    async fn start(&self, id: JobId) -> Result<bool, StoreError>;

    /// Records the model config blob resolved from the ledger
    async fn set_model_config_blob_id(&self, id: JobId, blob_id: &str) -> Result<(), StoreError>;

    /// Moves a job from `IN_PROGRESS` to `COMPLETED`, recording the transaction digest
    async fn complete(&self, id: JobId, digest: &str) -> Result<bool, StoreError>;

    /// Moves a job from `IN_PROGRESS` to `FAILED`, recording the reason
    async fn fail(&self, id: JobId, reason: &str) -> Result<bool, StoreError>;
}

/// PostgreSQL implementation of JobRepository
#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transition(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
        digest: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                completion_digest = COALESCE($2, completion_digest),
                failure_reason = COALESCE($3, failure_reason),
                updated_at = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(to.as_str())
        .bind(digest)
        .bind(reason)
        .bind(chrono::Utc::now())
        .bind(to_i64("id", id)?)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn insert_if_absent(&self, job: NewJob) -> Result<Option<Job>, StoreError> {
        let now = chrono::Utc::now();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, creator, pool_id, price, buyer_public_key, epochs,
                              learning_rate, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, creator, pool_id, price, buyer_public_key, epochs, learning_rate,
                      status, model_config_blob_id, completion_digest, failure_reason,
                      created_at, updated_at
            "#,
        )
        .bind(to_i64("id", job.id)?)
        .bind(&job.creator)
        .bind(to_i64("pool_id", job.pool_id)?)
        .bind(to_i64("price", job.price)?)
        .bind(&job.buyer_public_key)
        .bind(to_i64("epochs", job.epochs)?)
        .bind(to_i64("learning_rate", job.learning_rate)?)
        .bind(JobStatus::Pending.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, creator, pool_id, price, buyer_public_key, epochs, learning_rate,
                   status, model_config_blob_id, completion_digest, failure_reason,
                   created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(to_i64("id", id)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, creator, pool_id, price, buyer_public_key, epochs, learning_rate,
                   status, model_config_blob_id, completion_digest, failure_reason,
                   created_at, updated_at
            FROM jobs
            WHERE $1::VARCHAR IS NULL OR status = $1
            ORDER BY id ASC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn start(&self, id: JobId) -> Result<bool, StoreError> {
        self.transition(id, JobStatus::Pending, JobStatus::InProgress, None, None)
            .await
    }

    async fn set_model_config_blob_id(&self, id: JobId, blob_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET model_config_blob_id = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(blob_id)
        .bind(chrono::Utc::now())
        .bind(to_i64("id", id)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete(&self, id: JobId, digest: &str) -> Result<bool, StoreError> {
        self.transition(
            id,
            JobStatus::InProgress,
            JobStatus::Completed,
            Some(digest),
            None,
        )
        .await
    }

    async fn fail(&self, id: JobId, reason: &str) -> Result<bool, StoreError> {
        self.transition(
            id,
            JobStatus::InProgress,
            JobStatus::Failed,
            None,
            Some(reason),
        )
        .await
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(super) fn to_i64(column: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange { column, value })
}

fn to_u64(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("negative {}: {}", column, value)))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    creator: String,
    pool_id: i64,
    price: i64,
    buyer_public_key: Vec<u8>,
    epochs: i64,
    learning_rate: i64,
    status: String,
    model_config_blob_id: Option<String>,
    completion_digest: Option<String>,
    failure_reason: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Job {
            id: to_u64("id", row.id)?,
            creator: row.creator,
            pool_id: to_u64("pool_id", row.pool_id)?,
            price: to_u64("price", row.price)?,
            buyer_public_key: row.buyer_public_key,
            epochs: to_u64("epochs", row.epochs)?,
            learning_rate: to_u64("learning_rate", row.learning_rate)?,
            status,
            model_config_blob_id: row.model_config_blob_id,
            completion_digest: row.completion_digest,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
