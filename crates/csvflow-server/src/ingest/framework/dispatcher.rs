//! Upload dispatcher
//!
//! Validates a batch of uploaded files, creates one job per file and launches
//! one pipeline per file without waiting for any rows to be processed.
//!
//! Dispatch is not transactional. Count and extension checks run before any
//! job exists, but a per-file size violation or job creation failure is
//! reported after earlier files already have jobs with running pipelines.
//! [`DispatchError::Rejected`] carries those jobs.

use csvflow_common::types::{Job, UploadResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use super::pipeline::FilePipeline;
use super::source::FileSource;
use super::store::{JobStore, JobStoreError};
use crate::ingest::config::{PipelineConfig, UploadConfig};

/// A file that was not dispatched
#[derive(Debug)]
pub struct FileRejection {
    pub filename: String,
    pub reason: RejectionReason,
}

#[derive(Debug, thiserror::Error)]
pub enum RejectionReason {
    #[error("file {filename} exceeds maximum size limit ({size} > {max} bytes)")]
    TooLarge { filename: String, size: u64, max: u64 },

    #[error("failed to create job for {filename}: {source}")]
    JobCreation {
        filename: String,
        #[source]
        source: JobStoreError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no files uploaded")]
    Empty,

    #[error("too many files: {count} (maximum {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("invalid file type: {filename} (only .csv files are accepted)")]
    InvalidExtension { filename: String },

    #[error("{}", describe_rejections(.failures))]
    Rejected {
        failures: Vec<FileRejection>,
        /// Jobs created for the other files; their pipelines are running
        created: Vec<Job>,
    },

    #[error("server is shutting down")]
    ShuttingDown,
}

impl DispatchError {
    /// Whether the caller sent a bad batch, as opposed to a store failure
    pub fn is_validation(&self) -> bool {
        match self {
            DispatchError::Empty
            | DispatchError::TooManyFiles { .. }
            | DispatchError::InvalidExtension { .. } => true,
            DispatchError::Rejected { failures, .. } => failures
                .iter()
                .all(|f| matches!(f.reason, RejectionReason::TooLarge { .. })),
            DispatchError::ShuttingDown => false,
        }
    }
}

fn describe_rejections(failures: &[FileRejection]) -> String {
    failures
        .iter()
        .map(|f| f.reason.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone)]
pub struct UploadDispatcher {
    store: Arc<dyn JobStore>,
    pipeline: FilePipeline,
    limits: UploadConfig,
    tracker: TaskTracker,
    root: CancellationToken,
}

impl UploadDispatcher {
    pub fn new(store: Arc<dyn JobStore>, pipeline: PipelineConfig, limits: UploadConfig) -> Self {
        Self {
            pipeline: FilePipeline::new(store.clone(), pipeline),
            store,
            limits,
            tracker: TaskTracker::new(),
            root: CancellationToken::new(),
        }
    }

    pub fn limits(&self) -> &UploadConfig {
        &self.limits
    }

    /// Validate the batch, create jobs and launch a pipeline per file
    pub async fn dispatch(
        &self,
        files: Vec<Box<dyn FileSource>>,
    ) -> Result<UploadResponse, DispatchError> {
        if self.root.is_cancelled() {
            return Err(DispatchError::ShuttingDown);
        }
        self.validate_batch(&files)?;

        let mut created = Vec::with_capacity(files.len());
        let mut failures = Vec::new();

        for file in files {
            let filename = file.filename().to_owned();

            if file.size() > self.limits.max_file_size {
                let reason = RejectionReason::TooLarge {
                    filename: filename.clone(),
                    size: file.size(),
                    max: self.limits.max_file_size,
                };
                warn!(error = %reason, "Rejected uploaded file");
                failures.push(FileRejection { filename, reason });
                continue;
            }

            match self.store.create(&filename).await {
                Ok(job) => {
                    info!(job_id = %job.id, filename = %job.filename, size = file.size(), "Created CSV job");
                    self.launch(job.clone(), file);
                    created.push(job);
                }
                Err(source) => {
                    error!(filename = %filename, error = %source, "Failed to create CSV job");
                    failures.push(FileRejection {
                        reason: RejectionReason::JobCreation {
                            filename: filename.clone(),
                            source,
                        },
                        filename,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::Rejected { failures, created });
        }

        Ok(UploadResponse::new(created))
    }

    fn validate_batch(&self, files: &[Box<dyn FileSource>]) -> Result<(), DispatchError> {
        if files.is_empty() {
            return Err(DispatchError::Empty);
        }
        if files.len() > self.limits.max_files {
            return Err(DispatchError::TooManyFiles {
                count: files.len(),
                max: self.limits.max_files,
            });
        }
        if let Some(file) = files.iter().find(|f| !f.has_csv_extension()) {
            return Err(DispatchError::InvalidExtension {
                filename: file.filename().to_owned(),
            });
        }
        Ok(())
    }

    fn launch(&self, job: Job, file: Box<dyn FileSource>) {
        let pipeline = self.pipeline.clone();
        let token = self.root.child_token();
        let deadline = pipeline.config().processing_timeout;

        self.tracker.spawn(async move {
            let reader = match file.open().await {
                Ok(reader) => reader,
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Failed to open CSV file");
                    pipeline.fail_job(job.id, &e.to_string()).await;
                    return;
                }
            };

            let run = pipeline.run(job.id, reader, &token);
            tokio::pin!(run);

            let result = match deadline {
                Some(deadline) => {
                    tokio::select! {
                        result = &mut run => result,
                        _ = tokio::time::sleep(deadline) => {
                            warn!(job_id = %job.id, timeout_secs = deadline.as_secs(), "CSV processing timed out");
                            token.cancel();
                            run.await
                        }
                    }
                }
                None => run.await,
            };

            if let Err(e) = result {
                error!(job_id = %job.id, error = %e, "CSV processing failed");
            }
        });
    }

    /// Refuse new uploads and cancel every running pipeline
    pub fn cancel_all(&self) {
        self.root.cancel();
        self.tracker.close();
    }

    /// Cancel every running pipeline and wait up to `timeout` for them to finish
    ///
    /// Returns `false` if pipelines were still running when the timeout elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.cancel_all();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "Timed out waiting for CSV pipelines to finish"
                );
                false
            }
        }
    }

    /// Wait for every pipeline launched so far to finish, without cancelling
    ///
    /// A tracker closed by [`cancel_all`](Self::cancel_all) stays closed.
    #[cfg(test)]
    async fn wait_idle(&self) {
        let was_closed = self.tracker.is_closed();
        self.tracker.close();
        self.tracker.wait().await;
        if !was_closed && !self.root.is_cancelled() {
            self.tracker.reopen();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}
