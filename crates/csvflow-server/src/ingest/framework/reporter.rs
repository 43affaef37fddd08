//! Progress reporting
//!
//! Read path over the job store: single-shot progress lookups, job listing and
//! a polling live stream. Nothing here writes to the store or touches a
//! running pipeline.

use csvflow_common::types::{Job, JobProgress};
use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use super::store::{JobStore, JobStoreError};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("page must be at least 1")]
    InvalidPage,

    #[error("limit must be between 1 and 100")]
    InvalidLimit,

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// One page of jobs, newest first
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    poll_interval: Duration,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job, ReporterError> {
        self.store
            .fetch(id)
            .await?
            .ok_or(ReporterError::NotFound(id))
    }

    pub async fn get_progress(&self, id: Uuid) -> Result<JobProgress, ReporterError> {
        let job = self.get_job(id).await?;
        Ok(JobProgress::from_job(&job))
    }

    pub async fn list_jobs(
        &self,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<JobPage, ReporterError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page < 1 {
            return Err(ReporterError::InvalidPage);
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ReporterError::InvalidLimit);
        }

        let offset = (page - 1).saturating_mul(limit);
        let (jobs, total) = self.store.fetch_page(limit, offset).await?;

        Ok(JobPage {
            jobs,
            page,
            limit,
            total,
        })
    }

    /// Live progress for `id`
    ///
    /// Yields one snapshot immediately and then one per poll interval. The
    /// stream ends after yielding a terminal snapshot, or without an error
    /// item as soon as a fetch fails or the job disappears. Dropping the
    /// stream stops polling.
    pub fn stream(&self, id: Uuid) -> impl Stream<Item = JobProgress> + Send + 'static {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = StreamState {
            store: self.store.clone(),
            id,
            ticker,
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }
            state.ticker.tick().await;

            match state.store.fetch(state.id).await {
                Ok(Some(job)) => {
                    let progress = JobProgress::from_job(&job);
                    state.finished = progress.is_terminal();
                    Some((progress, state))
                }
                Ok(None) => {
                    debug!(job_id = %state.id, "Job disappeared, ending progress stream");
                    None
                }
                Err(e) => {
                    debug!(job_id = %state.id, error = %e, "Progress fetch failed, ending stream");
                    None
                }
            }
        })
    }
}

struct StreamState {
    store: Arc<dyn JobStore>,
    id: Uuid,
    ticker: Interval,
    finished: bool,
}
