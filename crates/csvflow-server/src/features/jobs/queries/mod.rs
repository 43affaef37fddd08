//! Job queries

pub mod get_job;
pub mod get_progress;
pub mod list_jobs;

pub use get_job::GetJobQuery;
pub use get_progress::GetProgressQuery;
pub use list_jobs::{ListJobsQuery, ListJobsResponse};

use uuid::Uuid;

use crate::error::AppError;

/// Parse a job id path segment
pub fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid job ID: {}", raw)))
}
