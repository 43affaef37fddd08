//! Bounded worker pool for row processing
//!
//! W workers share one inbound row-job queue and publish into one outbound
//! result queue. Both queues are bounded, so a slow consumer throttles the
//! reader instead of buffering the whole file.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error};

use super::processor::RowProcessor;
use super::types::{RowJob, RowResult};
use crate::ingest::config::PipelineConfig;

/// Why a row job could not be submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool was cancelled")]
    Cancelled,

    #[error("worker pool is closed")]
    Closed,
}

pub struct WorkerPool {
    jobs: Option<mpsc::Sender<RowJob>>,
    workers: JoinSet<()>,
    cancel: CancellationToken,
    /// Cancels the pool's scope when the pool is dropped
    _guard: DropGuard,
}

impl WorkerPool {
    /// Start `config.worker_pool_size` workers under a child of `parent`
    ///
    /// Returns the pool and the receiving end of its result queue. The result
    /// queue closes once every worker has exited.
    pub fn spawn(
        config: &PipelineConfig,
        processor: RowProcessor,
        parent: &CancellationToken,
    ) -> (Self, mpsc::Receiver<RowResult>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(config.row_queue_capacity.max(1));
        let (results_tx, results_rx) = mpsc::channel(config.result_queue_capacity.max(1));

        let cancel = parent.child_token();
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let processor = Arc::new(processor);

        let mut workers = JoinSet::new();
        for worker_id in 0..config.worker_pool_size.max(1) {
            workers.spawn(run_worker(
                worker_id,
                jobs_rx.clone(),
                results_tx.clone(),
                processor.clone(),
                cancel.clone(),
            ));
        }

        let pool = Self {
            jobs: Some(jobs_tx),
            workers,
            _guard: cancel.clone().drop_guard(),
            cancel,
        };

        (pool, results_rx)
    }

    /// Enqueue a row job, waiting while the inbound queue is full
    pub async fn submit(&self, job: RowJob) -> Result<(), PoolError> {
        let Some(jobs) = &self.jobs else {
            return Err(PoolError::Closed);
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PoolError::Cancelled),
            sent = jobs.send(job) => sent.map_err(|_| PoolError::Closed),
        }
    }

    /// Stop all workers: nothing new is accepted and blocked publishers return
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Close the inbound queue and wait for every worker to exit
    pub async fn shutdown(mut self) {
        self.jobs.take();

        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Row worker terminated abnormally");
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<RowJob>>>,
    results: mpsc::Sender<RowResult>,
    processor: Arc<RowProcessor>,
    cancel: CancellationToken,
) {
    debug!(worker_id, "Row worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = async { jobs.lock().await.recv().await } => next,
        };

        // Inbound queue closed and drained
        let Some(job) = next else { break };

        let result = processor.process(&job);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = results.send(result) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    debug!(worker_id, "Row worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::framework::types::Headers;
    use std::collections::HashSet;
    use std::time::Duration;
    use uuid::Uuid;

    fn config(workers: usize, capacity: usize) -> PipelineConfig {
        PipelineConfig {
            worker_pool_size: workers,
            row_queue_capacity: capacity,
            result_queue_capacity: capacity,
            ..Default::default()
        }
    }

    fn row(row_number: u64) -> RowJob {
        let headers: Headers = vec!["id".to_string()].into();
        RowJob {
            job_id: Uuid::nil(),
            row_number,
            fields: vec![row_number.to_string()],
            headers,
        }
    }

    #[tokio::test]
    async fn test_every_row_produces_one_result() {
        let token = CancellationToken::new();
        let (pool, mut results) = WorkerPool::spawn(&config(4, 8), RowProcessor::new(), &token);

        let collector = tokio::spawn(async move {
            let mut seen = HashSet::new();
            while let Some(result) = results.recv().await {
                assert!(result.is_success());
                assert!(seen.insert(result.row_number));
            }
            seen
        });

        for n in 1..=250 {
            pool.submit(row(n)).await.unwrap();
        }
        pool.shutdown().await;

        let seen = collector.await.unwrap();
        assert_eq!(seen.len(), 250);
        assert!((1..=250).all(|n| seen.contains(&n)));
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_queues() {
        let token = CancellationToken::new();
        let (pool, _results) = WorkerPool::spawn(&config(1, 1), RowProcessor::new(), &token);

        // Nobody drains results, so the pool fills up and submit blocks
        let mut submitted = 0u64;
        loop {
            submitted += 1;
            let attempt =
                tokio::time::timeout(Duration::from_millis(50), pool.submit(row(submitted))).await;
            if attempt.is_err() {
                break;
            }
        }

        pool.cancel();
        assert_eq!(pool.submit(row(submitted + 1)).await, Err(PoolError::Cancelled));

        tokio::time::timeout(Duration::from_secs(5), pool.shutdown())
            .await
            .expect("workers should exit after cancellation");
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_pool() {
        let token = CancellationToken::new();
        let (pool, _results) = WorkerPool::spawn(&config(2, 2), RowProcessor::new(), &token);

        token.cancel();
        assert!(pool.is_cancelled());
    }

    #[tokio::test]
    async fn test_pool_cancel_does_not_touch_parent() {
        let token = CancellationToken::new();
        let (pool, _results) = WorkerPool::spawn(&config(2, 2), RowProcessor::new(), &token);

        drop(pool);
        assert!(!token.is_cancelled());
    }
}
