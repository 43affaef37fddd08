use csvflow_common::types::UploadResponse;

use crate::ingest::framework::{DispatchError, FileSource, UploadDispatcher};

/// Batch of files received in one upload request
#[derive(Default)]
pub struct UploadCsvCommand {
    pub files: Vec<Box<dyn FileSource>>,
    /// Number of `files` fields in the request, including any not spooled
    pub received: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadCsvError {
    #[error("Filename is required for every uploaded file")]
    FilenameRequired,
    #[error("Filename must not exceed 255 characters")]
    FilenameLength,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl UploadCsvCommand {
    pub fn validate(&self, max_files: usize) -> Result<(), UploadCsvError> {
        if self.received > max_files {
            return Err(DispatchError::TooManyFiles {
                count: self.received,
                max: max_files,
            }
            .into());
        }
        for file in &self.files {
            if file.filename().trim().is_empty() {
                return Err(UploadCsvError::FilenameRequired);
            }
            if file.filename().len() > 255 {
                return Err(UploadCsvError::FilenameLength);
            }
        }
        Ok(())
    }
}

#[tracing::instrument(skip(dispatcher, command), fields(files = command.received))]
pub async fn handle(
    dispatcher: &UploadDispatcher,
    command: UploadCsvCommand,
) -> Result<UploadResponse, UploadCsvError> {
    command.validate(dispatcher.limits().max_files)?;

    Ok(dispatcher.dispatch(command.files).await?)
}
