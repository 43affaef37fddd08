//! Common test utilities for csvflow server integration tests
//!
//! In-memory helpers cover the pipeline and the HTTP API. [`TestPostgres`]
//! starts a throwaway PostgreSQL container with migrations applied and is only
//! used by tests marked `#[ignore = "requires Docker"]`.

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use csvflow_common::types::{Job, JobCounters, JobStatus};
use csvflow_server::ingest::{JobStore, JobStoreError, MemoryJobStore, PipelineConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// Tracing
// ============================================================================

/// Install a test subscriber once per binary; `RUST_LOG` controls verbosity
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("csvflow_server=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// In-memory fixtures
// ============================================================================

pub fn memory_store() -> Arc<MemoryJobStore> {
    Arc::new(MemoryJobStore::new())
}

/// Pipeline settings with a short flush interval so tests observe progress quickly
pub fn fast_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        worker_pool_size: 4,
        row_queue_capacity: 8,
        result_queue_capacity: 8,
        flush_interval: Duration::from_millis(20),
        ..PipelineConfig::default()
    }
}

/// Build a CSV body with a header and `rows` data rows
///
/// Rows for which `malformed` returns true carry one extra field.
pub fn csv_body(rows: u64, malformed: impl Fn(u64) -> bool) -> String {
    let mut body = String::from("id,name,email\n");
    for i in 1..=rows {
        if malformed(i) {
            body.push_str(&format!("{i},user{i},user{i}@example.com,extra\n"));
        } else {
            body.push_str(&format!("{i},user{i},user{i}@example.com\n"));
        }
    }
    body
}

/// Poll the store until the job reaches a terminal state
pub async fn wait_for_terminal(store: &dyn JobStore, id: Uuid, timeout: Duration) -> Job {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = store
            .fetch(id)
            .await
            .expect("job store fetch failed")
            .expect("job disappeared");
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} still {} after {timeout:?}",
            job.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn assert_status(job: &Job, status: JobStatus) {
    assert_eq!(
        job.status, status,
        "job {} ended {} ({:?})",
        job.id, job.status, job.error_message
    );
}

// ============================================================================
// Failing store
// ============================================================================

/// In-memory store that refuses every progress flush and, optionally, the
/// `fail_create_at`-th job creation (1-based)
pub struct FlakyStore {
    inner: MemoryJobStore,
    fail_create_at: Option<usize>,
    creates: AtomicUsize,
    failed_flushes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(fail_create_at: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryJobStore::new(),
            fail_create_at,
            creates: AtomicUsize::new(0),
            failed_flushes: AtomicUsize::new(0),
        })
    }

    pub fn failed_flushes(&self) -> usize {
        self.failed_flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create(&self, filename: &str) -> Result<Job, JobStoreError> {
        let attempt = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create_at == Some(attempt) {
            return Err(JobStoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.create(filename).await
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Job>, JobStoreError> {
        self.inner.fetch(id).await
    }

    async fn fetch_all(&self) -> Result<Vec<Job>, JobStoreError> {
        self.inner.fetch_all().await
    }

    async fn update_progress(&self, _id: Uuid, _counters: JobCounters) -> Result<(), JobStoreError> {
        self.failed_flushes.fetch_add(1, Ordering::SeqCst);
        Err(JobStoreError::Unavailable("progress writes refused".to_string()))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), JobStoreError> {
        self.inner.update_status(id, status, error_message).await
    }

    async fn complete(&self, id: Uuid, counters: JobCounters) -> Result<(), JobStoreError> {
        self.inner.complete(id, counters).await
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with the `csv_jobs` migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        csvflow_server::db::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Migrations completed successfully");

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}
