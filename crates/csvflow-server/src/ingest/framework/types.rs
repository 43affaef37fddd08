//! Core types for the CSV ingestion framework

use csvflow_common::types::JobCounters;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Header row shared by every row job of one file
pub type Headers = Arc<[String]>;

/// One row's worth of work handed to a worker
///
/// Owns its field values. Once a row job is queued nothing else holds a
/// reference to them, so later reads into the reader's record buffer cannot
/// reach a job that is already in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowJob {
    pub job_id: Uuid,
    /// 1-based, assigned in read order
    pub row_number: u64,
    pub fields: Vec<String>,
    pub headers: Headers,
}

impl RowJob {
    /// Copy the fields of a (possibly reused) record buffer into an owned row job
    pub fn from_record(
        job_id: Uuid,
        row_number: u64,
        record: &csv_async::StringRecord,
        headers: Headers,
    ) -> Self {
        Self {
            job_id,
            row_number,
            fields: record.iter().map(str::to_owned).collect(),
            headers,
        }
    }
}

/// Why a single row failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("simulated processing error")]
    InjectedFault,
}

/// Outcome of processing one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Header -> value map of the row
    Success(BTreeMap<String, String>),
    Failure(RowError),
}

/// Result published by a worker for one row job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    pub row_number: u64,
    pub outcome: RowOutcome,
}

impl RowResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RowOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&RowError> {
        match &self.outcome {
            RowOutcome::Failure(err) => Some(err),
            RowOutcome::Success(_) => None,
        }
    }
}

/// In-memory running counters for one file
///
/// Shared between the row reader (rows read, read failures) and the
/// aggregator (row results). Every update is a single atomic increment.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    rows_read: AtomicI64,
    processed: AtomicI64,
    failed: AtomicI64,
}

impl ProgressCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_read(&self) {
        self.rows_read.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn rows_read(&self) -> i64 {
        self.rows_read.load(Ordering::SeqCst)
    }

    /// Consistent view for persistence
    ///
    /// Outcomes are loaded before `rows_read`: every row is counted as read
    /// before its outcome is counted, so the snapshot never reports more
    /// outcomes than rows.
    pub fn snapshot(&self) -> JobCounters {
        let processed = self.processed.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let total = self.rows_read.load(Ordering::SeqCst);
        JobCounters {
            total,
            processed,
            failed,
        }
    }
}
