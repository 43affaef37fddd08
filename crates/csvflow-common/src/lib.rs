//! csvflow Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the csvflow workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all csvflow workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Centralized `tracing` subscriber configuration
//! - **Types**: Job records and progress snapshots exchanged over the API
//!
//! # Example
//!
//! ```no_run
//! use csvflow_common::types::{JobProgress, JobStatus};
//!
//! fn describe(progress: &JobProgress) -> String {
//!     format!("{} ({:.2}% ok)", progress.status, progress.success_rate)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CsvflowError, Result};
