//! Feature modules implementing the csvflow API
//!
//! Each feature is organized as a vertical slice with its own commands,
//! queries and routes.
//!
//! # Features
//!
//! - **uploads**: Multipart CSV uploads handed to the upload dispatcher
//! - **jobs**: Job records, progress snapshots and live progress streams
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions

pub mod jobs;
pub mod uploads;

use axum::Router;

use crate::ingest::framework::{ProgressReporter, UploadDispatcher};

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Creates jobs and launches per-file pipelines
    pub dispatcher: UploadDispatcher,
    /// Read path over the job store
    pub reporter: ProgressReporter,
}

/// Creates the main API router with all feature routes mounted
///
/// - `/uploads` - CSV uploads
/// - `/jobs` - Job records and progress
pub fn router(state: FeatureState) -> Router<()> {
    let max_request_body = state.dispatcher.limits().max_request_body();

    Router::new()
        .nest(
            "/uploads",
            uploads::uploads_routes(max_request_body).with_state(state.dispatcher.clone()),
        )
        .nest("/jobs", jobs::jobs_routes().with_state(state.reporter.clone()))
}
