//! List jobs query
//!
//! Paginated listing of CSV jobs, newest first.

use csvflow_common::types::Job;
use serde::{Deserialize, Serialize};

use crate::api::response::PaginationMeta;
use crate::ingest::framework::{ProgressReporter, ReporterError};

/// Query to list jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJobsQuery {
    /// 1-based page number (default 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Page size, 1..=100 (default 10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Response for list jobs query
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub items: Vec<Job>,
    pub pagination: PaginationMeta,
}

pub async fn handle(
    reporter: &ProgressReporter,
    query: ListJobsQuery,
) -> Result<ListJobsResponse, ReporterError> {
    let page = reporter.list_jobs(query.page, query.limit).await?;

    Ok(ListJobsResponse {
        items: page.jobs,
        pagination: PaginationMeta::new(page.page, page.limit, page.total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::framework::{JobStore, MemoryJobStore};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_list_jobs_pagination() {
        let store = Arc::new(MemoryJobStore::new());
        for i in 0..12 {
            store.create(&format!("{i}.csv")).await.unwrap();
        }
        let reporter = ProgressReporter::new(store, Duration::from_secs(2));

        let response = handle(
            &reporter,
            ListJobsQuery {
                page: Some(2),
                limit: Some(5),
            },
        )
        .await
        .unwrap();

        assert_eq!(response.items.len(), 5);
        assert_eq!(response.pagination.total, 12);
        assert_eq!(response.pagination.pages, 3);
        assert!(response.pagination.has_next);
    }
}
