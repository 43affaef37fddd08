//! Progress aggregation
//!
//! Consumes row results, keeps the running counters and flushes a snapshot to
//! the job store on a fixed cadence that does not depend on result arrival.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::store::JobStore;
use super::types::{ProgressCounters, RowOutcome, RowResult};

/// How the aggregator loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorExit {
    /// Result queue closed and every result was counted
    Drained,
    Cancelled,
}

pub struct ProgressAggregator {
    job_id: Uuid,
    store: Arc<dyn JobStore>,
    counters: Arc<ProgressCounters>,
    flush_interval: Duration,
}

impl ProgressAggregator {
    pub fn new(
        job_id: Uuid,
        store: Arc<dyn JobStore>,
        counters: Arc<ProgressCounters>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            job_id,
            store,
            counters,
            flush_interval,
        }
    }

    pub async fn run(
        self,
        mut results: mpsc::Receiver<RowResult>,
        cancel: CancellationToken,
    ) -> AggregatorExit {
        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(job_id = %self.job_id, "Progress aggregator cancelled");
                    return AggregatorExit::Cancelled;
                }
                next = results.recv() => match next {
                    Some(result) => self.record(result),
                    None => return AggregatorExit::Drained,
                },
                _ = ticker.tick() => self.flush().await,
            }
        }
    }

    fn record(&self, result: RowResult) {
        match result.outcome {
            RowOutcome::Success(_) => self.counters.record_success(),
            RowOutcome::Failure(err) => {
                self.counters.record_failure();
                warn!(
                    job_id = %self.job_id,
                    row_number = result.row_number,
                    error = %err,
                    "CSV row processing failed"
                );
            }
        }
    }

    /// Best-effort: a failed flush is superseded by the next tick or the final write
    async fn flush(&self) {
        let snapshot = self.counters.snapshot();
        if let Err(e) = self.store.update_progress(self.job_id, snapshot).await {
            warn!(job_id = %self.job_id, error = %e, "Failed to flush job progress");
        }
    }
}
