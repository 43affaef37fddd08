//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::ingest::framework::{DispatchError, JobStoreError, RejectionReason, ReporterError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Job store error: {0}")]
    Store(#[from] JobStoreError),

    #[error("Upload rejected: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ReporterError> for AppError {
    fn from(err: ReporterError) -> Self {
        match err {
            ReporterError::NotFound(id) => AppError::NotFound(format!("Job {id} not found")),
            ReporterError::InvalidPage | ReporterError::InvalidLimit => {
                AppError::Validation(err.to_string())
            },
            ReporterError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", message))
            },
            AppError::Validation(message) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("VALIDATION_ERROR", message))
            },
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("BAD_REQUEST", message))
            },
            AppError::Store(e) => {
                tracing::error!("Job store error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("DATABASE_ERROR", "A database error occurred"),
                )
            },
            AppError::Dispatch(e) => dispatch_error_response(e),
            AppError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::new("UNAVAILABLE", message))
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
                )
            },
        };

        (status, Json(error)).into_response()
    }
}

/// Map a dispatch failure, listing any jobs that were created anyway
fn dispatch_error_response(err: DispatchError) -> (StatusCode, ErrorResponse) {
    if matches!(err, DispatchError::ShuttingDown) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorResponse::new("UNAVAILABLE", err.to_string()),
        );
    }

    let validation = err.is_validation();
    let (status, code) = if validation {
        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
    };

    match err {
        DispatchError::Rejected { failures, created } => {
            let rejected: Vec<_> = failures
                .iter()
                .map(|f| match &f.reason {
                    RejectionReason::TooLarge { .. } => json!({
                        "filename": f.filename,
                        "reason": f.reason.to_string(),
                    }),
                    RejectionReason::JobCreation { source, .. } => {
                        tracing::error!(filename = %f.filename, "Job creation failed: {:?}", source);
                        json!({
                            "filename": f.filename,
                            "reason": "failed to create job",
                        })
                    },
                })
                .collect();

            let message = if validation {
                failures
                    .iter()
                    .map(|f| f.reason.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            } else {
                "Failed to create jobs for some files".to_string()
            };

            let details = json!({
                "rejected": rejected,
                "created_jobs": created,
            });
            (status, ErrorResponse::with_details(code, message, details))
        },
        other => (status, ErrorResponse::new(code, other.to_string())),
    }
}
