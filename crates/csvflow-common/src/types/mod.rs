//! Common types used across csvflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CsvflowError;

/// CSV job status
///
/// A job starts `Pending`, moves to `Processing` once its file is being read,
/// and ends in exactly one of the terminal states `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transitions can happen from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = CsvflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CsvflowError::InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CSV processing job (maps to the csv_jobs table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub failed_rows: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a fresh pending job with all counters at zero
    pub fn pending(id: Uuid, filename: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: filename.into(),
            status: JobStatus::Pending,
            total_rows: 0,
            processed_rows: 0,
            failed_rows: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn counters(&self) -> JobCounters {
        JobCounters {
            total: self.total_rows,
            processed: self.processed_rows,
            failed: self.failed_rows,
        }
    }
}

/// Row counters for one job at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    /// Rows read so far (final once the job is terminal)
    pub total: i64,
    /// Rows processed successfully
    pub processed: i64,
    /// Rows that failed to decode or process
    pub failed: i64,
}

/// Progress snapshot returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub failed_rows: i64,
    pub success_rate: f64,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
}

impl JobProgress {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            failed_rows: job.failed_rows,
            success_rate: success_rate(job.processed_rows, job.failed_rows, job.total_rows),
            status: job.status,
            message: status_message(job.status, job.error_message.as_deref()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Calculate `(processed - failed) / total * 100`, or 0 when nothing was read
pub fn success_rate(processed: i64, failed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (processed - failed) as f64 / total as f64 * 100.0
}

fn status_message(status: JobStatus, error_message: Option<&str>) -> String {
    match status {
        JobStatus::Pending => "Job is waiting to be processed".to_string(),
        JobStatus::Processing => "Job is currently being processed".to_string(),
        JobStatus::Completed => "Job processing completed successfully".to_string(),
        JobStatus::Failed => error_message
            .filter(|msg| !msg.is_empty())
            .unwrap_or("Job processing failed")
            .to_string(),
    }
}

/// Response returned after a batch of files was accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub jobs: Vec<Job>,
    pub message: String,
}

impl UploadResponse {
    pub fn new(jobs: Vec<Job>) -> Self {
        let message = format!("Successfully uploaded {} CSV files for processing", jobs.len());
        Self { jobs, message }
    }
}
