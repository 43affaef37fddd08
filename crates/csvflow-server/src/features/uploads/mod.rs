//! Uploads feature module
//!
//! Accepts multipart batches of CSV files and hands them to the upload
//! dispatcher. The response lists the created jobs; processing continues in
//! the background.

pub mod commands;
pub mod routes;

pub use commands::{UploadCsvCommand, UploadCsvError};
pub use routes::uploads_routes;
