//! Error types for csvflow

use thiserror::Error;

/// Result type alias for csvflow operations
pub type Result<T> = std::result::Result<T, CsvflowError>;

/// Main error type shared by csvflow crates
#[derive(Error, Debug)]
pub enum CsvflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid job status: {0}")]
    InvalidStatus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
