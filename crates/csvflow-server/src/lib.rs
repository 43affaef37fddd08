//! csvflow Server Library
//!
//! HTTP server for concurrent CSV ingestion with live progress reporting.
//!
//! # Overview
//!
//! - **Uploads**: Multipart batches of CSV files, one job per file
//! - **Pipeline**: Each file is streamed through a bounded worker pool while a
//!   progress aggregator flushes counters to the job store
//! - **Progress**: Point-in-time snapshots and a server-sent event stream
//! - **Persistence**: PostgreSQL via SQLx, or an in-memory job store when no
//!   database is configured
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use csvflow_server::{api, config::Config, ingest::MemoryJobStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let state = api::AppState::new(Arc::new(MemoryJobStore::new()), &config);
//!     let app = api::create_router(state, &config);
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
