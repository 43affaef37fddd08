//! PostgreSQL job store tests using testcontainers
//!
//! # Running These Tests
//!
//! These tests require Docker to be running. Run with:
//!
//! ```bash
//! cargo test --test pg_store_tests -- --ignored --nocapture
//! ```

mod common;

use common::{csv_body, fast_pipeline_config, init_test_tracing, TestPostgres};
use csvflow_common::types::{JobCounters, JobStatus};
use csvflow_server::db::PgJobStore;
use csvflow_server::ingest::{FilePipeline, JobStore, JobStoreError};
use std::io::Cursor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

async fn start_store() -> (TestPostgres, Arc<PgJobStore>) {
    init_test_tracing();
    let pg = TestPostgres::start()
        .await
        .expect("Failed to start PostgreSQL container");
    let store = Arc::new(PgJobStore::new(pg.pool_clone()));
    (pg, store)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_and_fetch_job() {
    let (_pg, store) = start_store().await;

    let job = store.create("users.csv").await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.counters(), JobCounters::default());
    assert!(job.started_at.is_none());

    let fetched = store.fetch(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, job.id);
    assert_eq!(fetched.filename, "users.csv");

    assert!(store.fetch(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_progress_is_monotonic_and_frozen_after_completion() {
    let (_pg, store) = start_store().await;
    let job = store.create("progress.csv").await.unwrap();

    store
        .update_status(job.id, JobStatus::Processing, None)
        .await
        .unwrap();
    store
        .update_progress(job.id, JobCounters { total: 10, processed: 6, failed: 1 })
        .await
        .unwrap();
    // A stale flush never moves counters backwards
    store
        .update_progress(job.id, JobCounters { total: 8, processed: 5, failed: 1 })
        .await
        .unwrap();

    let job_now = store.fetch(job.id).await.unwrap().unwrap();
    assert_eq!(job_now.counters(), JobCounters { total: 10, processed: 6, failed: 1 });
    assert!(job_now.started_at.is_some());

    let final_counters = JobCounters { total: 12, processed: 10, failed: 2 };
    store.complete(job.id, final_counters).await.unwrap();

    store
        .update_status(job.id, JobStatus::Failed, Some("late failure"))
        .await
        .unwrap();
    store
        .update_progress(job.id, JobCounters { total: 50, processed: 50, failed: 0 })
        .await
        .unwrap();

    let done = store.fetch(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.counters(), final_counters);
    assert!(done.completed_at.is_some());
    assert!(done.error_message.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_updates_to_missing_job_are_not_found() {
    let (_pg, store) = start_store().await;
    let id = Uuid::new_v4();

    let err = store
        .update_status(id, JobStatus::Processing, None)
        .await
        .unwrap_err();
    assert!(matches!(err, JobStoreError::NotFound(missing) if missing == id));

    let err = store
        .update_progress(id, JobCounters::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JobStoreError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_fetch_page_orders_newest_first() {
    let (_pg, store) = start_store().await;

    for name in ["a.csv", "b.csv", "c.csv"] {
        store.create(name).await.unwrap();
    }

    let (jobs, total) = store.fetch_page(2, 0).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].filename, "c.csv");

    let (rest, _) = store.fetch_page(2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].filename, "a.csv");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pipeline_against_postgres() {
    let (_pg, store) = start_store().await;
    let job = store.create("pg.csv").await.unwrap();

    let summary = FilePipeline::new(store.clone(), fast_pipeline_config())
        .run(
            job.id,
            Cursor::new(csv_body(500, |i| i % 10 == 0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.counters, JobCounters { total: 500, processed: 450, failed: 50 });

    let stored = store.fetch(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.counters(), summary.counters);
    store.health_check().await.unwrap();
}
