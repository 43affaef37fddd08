//! Row processor
//!
//! Pure mapping from one raw row plus the file's headers to a structured
//! result. No I/O, no shared state.

use std::collections::BTreeMap;
use std::num::NonZeroU64;

use super::types::{RowError, RowJob, RowOutcome, RowResult};

#[derive(Debug, Clone, Default)]
pub struct RowProcessor {
    fail_every_nth_row: Option<NonZeroU64>,
}

impl RowProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `n`th row with [`RowError::InjectedFault`]
    ///
    /// Exists to exercise the per-row failure path; production configuration
    /// leaves it off.
    pub fn with_fault_injection(mut self, every_nth_row: Option<NonZeroU64>) -> Self {
        self.fail_every_nth_row = every_nth_row;
        self
    }

    pub fn process(&self, job: &RowJob) -> RowResult {
        RowResult {
            row_number: job.row_number,
            outcome: self.outcome(job),
        }
    }

    fn outcome(&self, job: &RowJob) -> RowOutcome {
        if job.fields.len() != job.headers.len() {
            return RowOutcome::Failure(RowError::ColumnCountMismatch {
                expected: job.headers.len(),
                actual: job.fields.len(),
            });
        }

        if let Some(n) = self.fail_every_nth_row {
            if job.row_number % n.get() == 0 {
                return RowOutcome::Failure(RowError::InjectedFault);
            }
        }

        let data: BTreeMap<String, String> = job
            .headers
            .iter()
            .cloned()
            .zip(job.fields.iter().cloned())
            .collect();

        RowOutcome::Success(data)
    }
}
