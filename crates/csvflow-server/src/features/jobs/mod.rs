//! Jobs feature module
//!
//! Read-only access to CSV job records and their progress, including a live
//! server-sent event stream.

pub mod queries;
pub mod routes;

pub use routes::jobs_routes;
