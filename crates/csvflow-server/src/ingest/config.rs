//! Ingestion configuration
//!
//! Worker pool sizing, queue capacities, flush cadence and upload limits for
//! CSV processing. Everything here is passed explicitly into the dispatcher and
//! pipelines; nothing is read from process-wide state after startup.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Default number of row workers per file.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Default capacity of the inbound row-job queue.
pub const DEFAULT_ROW_QUEUE_CAPACITY: usize = 100;

/// Default capacity of the outbound result queue.
pub const DEFAULT_RESULT_QUEUE_CAPACITY: usize = 100;

/// Default interval between progress flushes (and live stream pushes).
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Default per-file size ceiling (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default maximum number of files per upload.
pub const DEFAULT_MAX_FILES: usize = 10;

/// Allowance for boundary and part headers around each uploaded file
pub const MULTIPART_OVERHEAD_PER_FILE: u64 = 16 * 1024;

/// Per-file pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent row workers per file
    pub worker_pool_size: usize,
    /// Capacity of the queue between the row reader and the workers
    pub row_queue_capacity: usize,
    /// Capacity of the queue between the workers and the aggregator
    pub result_queue_capacity: usize,
    /// How often running counters are flushed to the job store
    pub flush_interval: Duration,
    /// Optional deadline for a single file; elapsing cancels the pipeline
    pub processing_timeout: Option<Duration>,
    /// Synthetic failure of every Nth row. Test scaffolding only, never on by default.
    pub fail_every_nth_row: Option<NonZeroU64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            row_queue_capacity: DEFAULT_ROW_QUEUE_CAPACITY,
            result_queue_capacity: DEFAULT_RESULT_QUEUE_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            processing_timeout: None,
            fail_every_nth_row: None,
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from environment variables
    ///
    /// - `CSVFLOW_WORKER_POOL_SIZE`
    /// - `CSVFLOW_ROW_QUEUE_CAPACITY`
    /// - `CSVFLOW_RESULT_QUEUE_CAPACITY`
    /// - `CSVFLOW_FLUSH_INTERVAL_MS`
    /// - `CSVFLOW_PROCESSING_TIMEOUT_SECS` (unset = no deadline)
    /// - `CSVFLOW_FAULT_EVERY_NTH_ROW` (unset = disabled)
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            worker_pool_size: env_or("CSVFLOW_WORKER_POOL_SIZE", DEFAULT_WORKER_POOL_SIZE),
            row_queue_capacity: env_or("CSVFLOW_ROW_QUEUE_CAPACITY", DEFAULT_ROW_QUEUE_CAPACITY),
            result_queue_capacity: env_or(
                "CSVFLOW_RESULT_QUEUE_CAPACITY",
                DEFAULT_RESULT_QUEUE_CAPACITY,
            ),
            flush_interval: std::env::var("CSVFLOW_FLUSH_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_FLUSH_INTERVAL),
            processing_timeout: std::env::var("CSVFLOW_PROCESSING_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            fail_every_nth_row: std::env::var("CSVFLOW_FAULT_EVERY_NTH_ROW")
                .ok()
                .and_then(|s| s.parse().ok()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_pool_size == 0 {
            anyhow::bail!("CSVFLOW_WORKER_POOL_SIZE must be greater than 0");
        }
        if self.row_queue_capacity == 0 {
            anyhow::bail!("CSVFLOW_ROW_QUEUE_CAPACITY must be greater than 0");
        }
        if self.result_queue_capacity == 0 {
            anyhow::bail!("CSVFLOW_RESULT_QUEUE_CAPACITY must be greater than 0");
        }
        if self.flush_interval.is_zero() {
            anyhow::bail!("CSVFLOW_FLUSH_INTERVAL_MS must be greater than 0");
        }
        if let Some(timeout) = self.processing_timeout {
            if timeout.is_zero() {
                anyhow::bail!("CSVFLOW_PROCESSING_TIMEOUT_SECS must be greater than 0");
            }
        }
        if let Some(n) = self.fail_every_nth_row {
            tracing::warn!(every_nth_row = n.get(), "Synthetic row fault injection is enabled");
        }
        Ok(())
    }

    /// Upper bound on rows held in memory for one file at any instant
    pub fn max_in_flight_rows(&self) -> usize {
        self.row_queue_capacity + self.worker_pool_size + self.result_queue_capacity
    }
}

/// Upload batch limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_files: usize,
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl UploadConfig {
    /// Load upload limits from `CSVFLOW_MAX_FILES` and `CSVFLOW_MAX_FILE_SIZE`
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            max_files: env_or("CSVFLOW_MAX_FILES", DEFAULT_MAX_FILES),
            max_file_size: env_or("CSVFLOW_MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_files == 0 {
            anyhow::bail!("CSVFLOW_MAX_FILES must be greater than 0");
        }
        if self.max_file_size == 0 {
            anyhow::bail!("CSVFLOW_MAX_FILE_SIZE must be greater than 0");
        }
        Ok(())
    }

    /// Largest request body an upload can legitimately need
    ///
    /// Per-file sizes are enforced separately while each field is spooled.
    pub fn max_request_body(&self) -> usize {
        let files = self.max_files as u64;
        let per_file = self.max_file_size.saturating_add(MULTIPART_OVERHEAD_PER_FILE);
        usize::try_from(files.saturating_mul(per_file)).unwrap_or(usize::MAX)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
