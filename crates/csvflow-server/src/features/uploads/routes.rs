use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tokio::io::AsyncWriteExt;

use super::commands::{upload, UploadCsvCommand, UploadCsvError};
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::ingest::framework::{
    DispatchError, FileRejection, LocalFile, RejectionReason, UploadDispatcher,
};

/// Multipart field carrying the CSV files
pub const FILES_FIELD: &str = "files";

pub fn uploads_routes(max_request_body: usize) -> Router<UploadDispatcher> {
    Router::new()
        .route("/", post(upload_files))
        .layer(DefaultBodyLimit::max(max_request_body))
}

/// Upload CSV files
///
/// POST /uploads (multipart/form-data, repeated `files` field)
#[tracing::instrument(skip(dispatcher, multipart))]
async fn upload_files(
    State(dispatcher): State<UploadDispatcher>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let max_files = dispatcher.limits().max_files;
    let mut command = UploadCsvCommand::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        command.received += 1;
        // Past the limit the request is rejected anyway; only count the rest
        if command.received > max_files {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let file = spool_field(field, filename, dispatcher.limits().max_file_size).await?;

        command.files.push(Box::new(file));
    }

    let response = upload::handle(&dispatcher, command).await?;

    tracing::info!(jobs = response.jobs.len(), "CSV files accepted for processing");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

/// Stream one multipart field into a temporary file
///
/// Stops reading as soon as the field exceeds `max_size`; the whole request is
/// then rejected before any job is created.
async fn spool_field(
    mut field: Field<'_>,
    filename: String,
    max_size: u64,
) -> Result<LocalFile, AppError> {
    let (file, path) = tempfile::Builder::new()
        .prefix("csvflow-upload-")
        .tempfile()
        .map_err(|e| AppError::Internal(format!("Failed to create upload spool file: {}", e)))?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);
    let mut size: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read file {}: {}", filename, e)))?
    {
        size += chunk.len() as u64;
        if size > max_size {
            tracing::warn!(filename = %filename, max_size, "Uploaded file exceeds size limit");
            let reason = RejectionReason::TooLarge {
                filename: filename.clone(),
                size,
                max: max_size,
            };
            return Err(DispatchError::Rejected {
                failures: vec![FileRejection { filename, reason }],
                created: Vec::new(),
            }
            .into());
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to spool file {}: {}", filename, e)))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to spool file {}: {}", filename, e)))?;

    Ok(LocalFile::temporary(filename, path, size))
}

impl From<UploadCsvError> for AppError {
    fn from(err: UploadCsvError) -> Self {
        match err {
            UploadCsvError::FilenameRequired | UploadCsvError::FilenameLength => {
                AppError::Validation(err.to_string())
            },
            UploadCsvError::Dispatch(e) => AppError::Dispatch(e),
        }
    }
}
