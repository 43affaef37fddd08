//! Get job query
//!
//! Query to get a single job record by ID.

use csvflow_common::types::Job;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::framework::{ProgressReporter, ReporterError};

/// Query to get a job by ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJobQuery {
    pub job_id: Uuid,
}

pub async fn handle(reporter: &ProgressReporter, query: GetJobQuery) -> Result<Job, ReporterError> {
    reporter.get_job(query.job_id).await
}
