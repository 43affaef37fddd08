//! Concurrent CSV ingestion framework
//!
//! Upload dispatcher → (per file) file pipeline → worker pool → progress
//! aggregator → job store. The progress reporter reads the job store
//! independently of any running pipeline.

pub mod aggregator;
pub mod dispatcher;
pub mod pipeline;
pub mod processor;
pub mod reporter;
pub mod source;
pub mod store;
pub mod types;
pub mod worker;

pub use aggregator::ProgressAggregator;
pub use dispatcher::{DispatchError, FileRejection, RejectionReason, UploadDispatcher};
pub use pipeline::{FilePipeline, PipelineError, PipelineSummary, CANCELLED_MESSAGE};
pub use processor::RowProcessor;
pub use reporter::{JobPage, ProgressReporter, ReporterError};
pub use source::{FileReader, FileSource, InMemoryFile, LocalFile};
pub use store::{JobStore, JobStoreError, MemoryJobStore};
pub use types::{ProgressCounters, RowError, RowJob, RowOutcome, RowResult};
pub use worker::{PoolError, WorkerPool};
