//! Get progress query

use csvflow_common::types::JobProgress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::framework::{ProgressReporter, ReporterError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetProgressQuery {
    pub job_id: Uuid,
}

pub async fn handle(
    reporter: &ProgressReporter,
    query: GetProgressQuery,
) -> Result<JobProgress, ReporterError> {
    reporter.get_progress(query.job_id).await
}
