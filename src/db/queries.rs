use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::job::{DetectionJob, JobStatus};
use crate::services::job_store::{JobStore, StoreError};

const JOB_COLUMNS: &str = "id, owner_id, asset_ref, status, verdict, error, \
                           processing_duration_ms, created_at, completed_at";

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Terminal write guarded on `status = 'pending'`.
    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        verdict: Option<&str>,
        error: Option<&str>,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE detection_jobs
            SET status = $1,
                verdict = $2,
                error = $3,
                processing_duration_ms = $4,
                completed_at = NOW()
            WHERE id = $5 AND status = 'pending'
            "#,
        )
        .bind(status.to_string())
        .bind(verdict)
        .bind(error)
        .bind(duration_ms)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.get(job_id).await? {
            Some(_) => Err(StoreError::AlreadyTerminal(job_id)),
            None => Err(StoreError::NotFound(job_id)),
        }
    }
}

fn job_from_row(row: &PgRow) -> Result<DetectionJob, StoreError> {
    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<JobStatus>()
        .map_err(|_| StoreError::InvalidStatus(status_str.clone()))?;

    Ok(DetectionJob {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        asset_ref: row.try_get("asset_ref")?,
        status,
        verdict: row.try_get("verdict")?,
        error: row.try_get("error")?,
        processing_duration_ms: row.try_get("processing_duration_ms")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, owner_id: &str, asset_ref: &str) -> Result<DetectionJob, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO detection_jobs (owner_id, asset_ref, status)
            VALUES ($1, $2, 'pending')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(asset_ref)
        .fetch_one(&self.pool)
        .await?;

        job_from_row(&row)
    }

    async fn complete(&self, job_id: Uuid, verdict: &str, duration_ms: i64) -> Result<(), StoreError> {
        self.finish(job_id, JobStatus::Completed, Some(verdict), None, duration_ms)
            .await
    }

    async fn fail(&self, job_id: Uuid, error: &str, duration_ms: i64) -> Result<(), StoreError> {
        self.finish(job_id, JobStatus::Failed, None, Some(error), duration_ms)
            .await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<DetectionJob>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM detection_jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DetectionJob>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM detection_jobs
            WHERE owner_id = $1
            ORDER BY created_at DESC, seq DESC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<DetectionJob>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM detection_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC, seq ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
