//! Per-file processing pipeline
//!
//! One pipeline instance runs one file end to end: mark the job processing,
//! read the header row, stream rows into a worker pool, drain results through
//! the aggregator and write the terminal state. Each run owns its own
//! cancellation token, so abandoning one file never touches its siblings.

use csv_async::{AsyncReaderBuilder, StringRecord};
use csvflow_common::types::{JobCounters, JobStatus};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::aggregator::{AggregatorExit, ProgressAggregator};
use super::processor::RowProcessor;
use super::store::{JobStore, JobStoreError};
use super::types::{Headers, ProgressCounters, RowJob};
use super::worker::WorkerPool;
use crate::ingest::config::PipelineConfig;

/// Error message persisted on a cancelled job
pub const CANCELLED_MESSAGE: &str = "processing cancelled";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read CSV headers: {0}")]
    Header(String),

    #[error("failed to read CSV headers: file is empty")]
    EmptyFile,

    #[error("failed to read CSV rows: {0}")]
    Read(String),

    #[error("processing cancelled")]
    Cancelled,

    #[error("progress aggregation failed: {0}")]
    Aggregation(String),

    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Final counters of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub job_id: Uuid,
    pub counters: JobCounters,
}

/// Why row streaming stopped early
enum StreamStop {
    Cancelled,
    Read(String),
}

#[derive(Clone)]
pub struct FilePipeline {
    store: Arc<dyn JobStore>,
    config: PipelineConfig,
    processor: RowProcessor,
}

impl FilePipeline {
    pub fn new(store: Arc<dyn JobStore>, config: PipelineConfig) -> Self {
        let processor = RowProcessor::new().with_fault_injection(config.fail_every_nth_row);
        Self {
            store,
            config,
            processor,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one file for `job_id`
    ///
    /// Every error path leaves the job failed with a message, except when the
    /// store itself rejects that write.
    pub async fn run<R>(
        &self,
        job_id: Uuid,
        reader: R,
        cancel: &CancellationToken,
    ) -> Result<PipelineSummary, PipelineError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let cancel = cancel.child_token();

        if let Err(e) = self
            .store
            .update_status(job_id, JobStatus::Processing, None)
            .await
        {
            error!(job_id = %job_id, error = %e, "Failed to mark job as processing");
            self.fail_job(job_id, &e.to_string()).await;
            return Err(e.into());
        }

        let mut reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .create_reader(reader);
        let mut record = StringRecord::new();

        let header = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(job_id = %job_id, "CSV processing cancelled before headers were read");
                self.fail_job(job_id, CANCELLED_MESSAGE).await;
                return Err(PipelineError::Cancelled);
            }
            read = reader.read_record(&mut record) => read,
        };

        let headers: Headers = match header {
            Ok(true) => record.iter().map(str::to_owned).collect::<Vec<_>>().into(),
            Ok(false) => {
                let err = PipelineError::EmptyFile;
                self.fail_job(job_id, &err.to_string()).await;
                return Err(err);
            }
            Err(e) => {
                let err = PipelineError::Header(e.to_string());
                self.fail_job(job_id, &err.to_string()).await;
                return Err(err);
            }
        };

        debug!(
            job_id = %job_id,
            columns = headers.len(),
            max_in_flight_rows = self.config.max_in_flight_rows(),
            "Streaming CSV rows"
        );

        let counters = ProgressCounters::new();
        let (pool, results) = WorkerPool::spawn(&self.config, self.processor.clone(), &cancel);
        let aggregator = ProgressAggregator::new(
            job_id,
            self.store.clone(),
            counters.clone(),
            self.config.flush_interval,
        );
        let aggregator = tokio::spawn(aggregator.run(results, cancel.clone()));

        let mut row_number = 0u64;
        let streamed = loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(StreamStop::Cancelled),
                read = reader.read_record(&mut record) => read,
            };

            match read {
                Ok(false) => break Ok(()),
                Ok(true) => {
                    counters.record_read();
                    row_number += 1;
                    let row = RowJob::from_record(job_id, row_number, &record, headers.clone());
                    if pool.submit(row).await.is_err() {
                        break Err(StreamStop::Cancelled);
                    }
                }
                Err(e) if matches!(e.kind(), csv_async::ErrorKind::Io(_)) => {
                    break Err(StreamStop::Read(e.to_string()));
                }
                Err(e) => {
                    counters.record_read();
                    counters.record_failure();
                    warn!(job_id = %job_id, error = %e, "Error reading CSV row");
                }
            }
        };

        if matches!(streamed, Err(StreamStop::Cancelled)) {
            pool.cancel();
        }
        pool.shutdown().await;
        let aggregated = match aggregator.await {
            Ok(exit) => exit,
            Err(e) => {
                let err = PipelineError::Aggregation(e.to_string());
                error!(job_id = %job_id, error = %err, "Progress aggregator terminated abnormally");
                self.abandon(job_id, counters.snapshot(), &err.to_string()).await;
                return Err(err);
            }
        };

        let snapshot = counters.snapshot();

        match streamed {
            // Counters are final only once every result was drained
            Ok(()) if aggregated == AggregatorExit::Drained && !cancel.is_cancelled() => {}
            Ok(()) | Err(StreamStop::Cancelled) => {
                warn!(job_id = %job_id, rows_read = snapshot.total, "CSV processing cancelled");
                self.abandon(job_id, snapshot, CANCELLED_MESSAGE).await;
                return Err(PipelineError::Cancelled);
            }
            Err(StreamStop::Read(message)) => {
                let err = PipelineError::Read(message);
                error!(job_id = %job_id, error = %err, "CSV stream failed");
                self.abandon(job_id, snapshot, &err.to_string()).await;
                return Err(err);
            }
        }

        if let Err(e) = self.store.complete(job_id, snapshot).await {
            error!(job_id = %job_id, error = %e, "Failed to complete job");
            self.fail_job(job_id, &format!("failed to complete job: {e}")).await;
            return Err(e.into());
        }

        info!(
            job_id = %job_id,
            total_rows = snapshot.total,
            processed_rows = snapshot.processed,
            failed_rows = snapshot.failed,
            "CSV processing completed"
        );

        Ok(PipelineSummary {
            job_id,
            counters: snapshot,
        })
    }

    /// Persist the partial counters, then mark the job failed
    async fn abandon(&self, job_id: Uuid, snapshot: JobCounters, message: &str) {
        if let Err(e) = self.store.update_progress(job_id, snapshot).await {
            warn!(job_id = %job_id, error = %e, "Failed to flush job progress");
        }
        self.fail_job(job_id, message).await;
    }

    /// Best-effort terminal failure
    pub(crate) async fn fail_job(&self, job_id: Uuid, message: &str) {
        if let Err(e) = self
            .store
            .update_status(job_id, JobStatus::Failed, Some(message))
            .await
        {
            error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
        }
    }
}
