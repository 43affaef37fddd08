//! PostgreSQL job store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csvflow_common::types::{Job, JobCounters, JobStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::ingest::framework::{JobStore, JobStoreError};

const JOB_COLUMNS: &str = "id, filename, status, total_rows, processed_rows, failed_rows, \
     error_message, started_at, completed_at, created_at, updated_at";

/// Row shape of `csv_jobs`
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    filename: String,
    status: String,
    total_rows: i64,
    processed_rows: i64,
    failed_rows: i64,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e: csvflow_common::CsvflowError| JobStoreError::InvalidRecord(e.to_string()))?;

        Ok(Job {
            id: row.id,
            filename: row.filename,
            status,
            total_rows: row.total_rows,
            processed_rows: row.processed_rows,
            failed_rows: row.failed_rows,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

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

    /// Distinguish "no such job" from "job already terminal" after a guarded update
    async fn ensure_exists(&self, id: Uuid) -> Result<(), JobStoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM csv_jobs WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Ok(())
        } else {
            Err(JobStoreError::NotFound(id))
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, filename: &str) -> Result<Job, JobStoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO csv_jobs (filename, status)
            VALUES ($1, $2)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(filename)
        .bind(JobStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM csv_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn fetch_all(&self) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM csv_jobs ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn fetch_page(&self, limit: i64, offset: i64) -> Result<(Vec<Job>, i64), JobStoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM csv_jobs
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM csv_jobs")
            .fetch_one(&self.pool)
            .await?;

        let jobs = rows.into_iter().map(Job::try_from).collect::<Result<_, _>>()?;
        Ok((jobs, total))
    }

    async fn update_progress(&self, id: Uuid, counters: JobCounters) -> Result<(), JobStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE csv_jobs
            SET total_rows = GREATEST(total_rows, $2),
                processed_rows = GREATEST(processed_rows, $3),
                failed_rows = GREATEST(failed_rows, $4),
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .bind(counters.total)
        .bind(counters.processed)
        .bind(counters.failed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.ensure_exists(id).await?;
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), JobStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE csv_jobs
            SET status = $2,
                error_message = $3,
                started_at = CASE WHEN $2 = 'processing' THEN COALESCE(started_at, NOW()) ELSE started_at END,
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.ensure_exists(id).await?;
        }
        Ok(())
    }

    async fn complete(&self, id: Uuid, counters: JobCounters) -> Result<(), JobStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE csv_jobs
            SET status = 'completed',
                total_rows = $2,
                processed_rows = $3,
                failed_rows = $4,
                error_message = NULL,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .bind(counters.total)
        .bind(counters.processed)
        .bind(counters.failed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.ensure_exists(id).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), JobStoreError> {
        super::health_check(&self.pool)
            .await
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))
    }
}
