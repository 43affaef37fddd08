//! Job store abstraction
//!
//! The job store is the sole owner of durable job state. The pipeline and the
//! aggregator write through it; the progress reporter only reads.

use async_trait::async_trait;
use chrono::Utc;
use csvflow_common::types::{Job, JobCounters, JobStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid job record: {0}")]
    InvalidRecord(String),

    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

/// Durable persistence for job records
///
/// Every method is an independent statement. Progress updates never move a
/// counter backwards, and neither progress nor status updates touch a job
/// that already reached a terminal status.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job with zeroed counters
    async fn create(&self, filename: &str) -> Result<Job, JobStoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Job>, JobStoreError>;

    /// All jobs, newest first
    async fn fetch_all(&self) -> Result<Vec<Job>, JobStoreError>;

    /// One page of jobs, newest first, plus the total number of jobs
    async fn fetch_page(&self, limit: i64, offset: i64) -> Result<(Vec<Job>, i64), JobStoreError> {
        let jobs = self.fetch_all().await?;
        let total = jobs.len() as i64;
        let page = jobs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_progress(&self, id: Uuid, counters: JobCounters) -> Result<(), JobStoreError>;

    /// Move a job to `status`
    ///
    /// `started_at` is set the first time a job enters `processing`;
    /// `completed_at` is set when it enters a terminal status.
    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), JobStoreError>;

    /// Final write: persist the counters and mark the job completed
    async fn complete(&self, id: Uuid, counters: JobCounters) -> Result<(), JobStoreError>;

    async fn health_check(&self) -> Result<(), JobStoreError> {
        Ok(())
    }
}

/// Job store held in process memory
///
/// Used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, filename: &str) -> Result<Job, JobStoreError> {
        let job = Job::pending(Uuid::new_v4(), filename, Utc::now());
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Job>, JobStoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<Job>, JobStoreError> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(jobs)
    }

    async fn update_progress(&self, id: Uuid, counters: JobCounters) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.status.is_terminal() {
            return Ok(());
        }

        job.total_rows = job.total_rows.max(counters.total);
        job.processed_rows = job.processed_rows.max(counters.processed);
        job.failed_rows = job.failed_rows.max(counters.failed);
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.status.is_terminal() {
            return Ok(());
        }

        let now = Utc::now();
        job.status = status;
        job.error_message = error_message.map(str::to_owned);
        if status == JobStatus::Processing && job.started_at.is_none() {
            job.started_at = Some(now);
        }
        if status.is_terminal() {
            job.completed_at = Some(now);
        }
        job.updated_at = now;
        Ok(())
    }

    async fn complete(&self, id: Uuid, counters: JobCounters) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.status.is_terminal() {
            return Ok(());
        }

        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.total_rows = counters.total;
        job.processed_rows = counters.processed;
        job.failed_rows = counters.failed;
        job.error_message = None;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }
}
