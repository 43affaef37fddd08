//! Job routes
//!
//! Read-only routes for job records and progress. The stream endpoint pushes
//! a `progress` server-sent event per poll interval until the job is terminal.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use serde_json::json;

use super::queries::{
    get_job, get_progress, list_jobs, parse_job_id, GetJobQuery, GetProgressQuery, ListJobsQuery,
};
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::ingest::framework::ProgressReporter;

/// SSE event name for progress snapshots
pub const PROGRESS_EVENT: &str = "progress";

/// Create job routes
pub fn jobs_routes() -> Router<ProgressReporter> {
    Router::new()
        .route("/", get(list_jobs_handler))
        .route("/:job_id", get(get_job_handler))
        .route("/:job_id/progress", get(get_progress_handler))
        .route("/:job_id/stream", get(stream_progress_handler))
}

/// List jobs
///
/// GET /jobs?page=1&limit=10
#[tracing::instrument(skip(reporter, query), fields(page = ?query.page, limit = ?query.limit))]
async fn list_jobs_handler(
    State(reporter): State<ProgressReporter>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Response, AppError> {
    let response = list_jobs::handle(&reporter, query).await?;

    tracing::debug!(
        count = response.items.len(),
        total = response.pagination.total,
        "Jobs listed via API"
    );

    let meta = json!({
        "pagination": response.pagination
    });

    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(response.items, meta))).into_response())
}

/// Get a job record
///
/// GET /jobs/:job_id
#[tracing::instrument(skip(reporter))]
async fn get_job_handler(
    State(reporter): State<ProgressReporter>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let query = GetJobQuery {
        job_id: parse_job_id(&job_id)?,
    };

    let job = get_job::handle(&reporter, query).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(job))).into_response())
}

/// Get a progress snapshot
///
/// GET /jobs/:job_id/progress
#[tracing::instrument(skip(reporter))]
async fn get_progress_handler(
    State(reporter): State<ProgressReporter>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let query = GetProgressQuery {
        job_id: parse_job_id(&job_id)?,
    };

    let progress = get_progress::handle(&reporter, query).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(progress))).into_response())
}

/// Stream progress snapshots as server-sent events
///
/// GET /jobs/:job_id/stream
#[tracing::instrument(skip(reporter))]
async fn stream_progress_handler(
    State(reporter): State<ProgressReporter>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let job_id = parse_job_id(&job_id)?;

    // Unknown jobs get a 404 instead of an empty stream
    reporter.get_job(job_id).await?;

    let events = reporter
        .stream(job_id)
        .map(|progress| Event::default().event(PROGRESS_EVENT).json_data(progress));

    tracing::debug!(job_id = %job_id, "Progress stream opened");

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}
