//! CSV ingestion
//!
//! # Architecture
//!
//! - **config**: Pipeline and upload limits (CSVFLOW_* environment variables)
//! - **framework**: Dispatcher, per-file pipeline, worker pool, progress
//!   aggregation and reporting, plus the job store and file source seams
//!
//! # Public API
//!
//! The HTTP endpoints are provided through the `features` module:
//! - `POST /api/v1/uploads` - Upload CSV files for processing
//! - `GET /api/v1/jobs` - List jobs
//! - `GET /api/v1/jobs/:job_id` - Get a job
//! - `GET /api/v1/jobs/:job_id/progress` - Get job progress
//! - `GET /api/v1/jobs/:job_id/stream` - Live job progress (SSE)

pub mod config;
pub mod framework;

pub use config::{PipelineConfig, UploadConfig};
pub use framework::{
    DispatchError, FilePipeline, FileSource, InMemoryFile, JobStore, JobStoreError, LocalFile,
    MemoryJobStore, ProgressReporter, ReporterError, UploadDispatcher,
};
