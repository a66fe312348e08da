//! Worker pool draining a task queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use queue_core::{QueueError, WorkerPoolConfig};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::task_queue::TaskQueue;

/// Fixed set of worker loops that claim and run jobs from one queue.
///
/// All loops share one shutdown token. Stopping lets in-flight jobs finish
/// and waits for every loop to exit.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<WorkerPoolRef>,
}

struct WorkerPoolRef {
    config: WorkerPoolConfig,
    queue: TaskQueue,
    shutdown: CancellationToken,
    tasks: Mutex<Option<JoinSet<()>>>,
    active: Arc<AtomicUsize>,
}

/// Decrements the live worker count however a loop exits.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// Create a stopped pool for `queue`.
    ///
    /// Fails with `InvalidArgument` for a zero worker count.
    pub fn new(queue: TaskQueue, config: WorkerPoolConfig) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(WorkerPoolRef {
                config,
                queue,
                shutdown: CancellationToken::new(),
                tasks: Mutex::new(None),
                active: Arc::new(AtomicUsize::new(0)),
            }),
        })
    }

    /// Spawn the worker loops.
    ///
    /// Calling it on a running pool logs a warning and does nothing. A stopped
    /// pool cannot be restarted.
    pub async fn start(&self) -> Result<(), QueueError> {
        let mut tasks = self.inner.tasks.lock().await;

        if self.inner.shutdown.is_cancelled() {
            return Err(QueueError::InvalidState(
                "worker pool has been stopped".into(),
            ));
        }
        if tasks.is_some() {
            tracing::warn!("Worker pool is already running");
            return Ok(());
        }

        tracing::info!(
            "Starting worker pool with {} worker(s), polling every {:?}",
            self.inner.config.workers,
            self.inner.config.poll_interval()
        );

        let mut join_set = JoinSet::new();
        for n in 1..=self.inner.config.workers {
            let worker_id = format!("worker-{}", n);
            let queue = self.inner.queue.clone();
            let shutdown = self.inner.shutdown.clone();
            let poll_interval = self.inner.config.poll_interval();

            self.inner.active.fetch_add(1, Ordering::SeqCst);
            let guard = ActiveGuard(Arc::clone(&self.inner.active));

            join_set.spawn(async move {
                let _guard = guard;
                run_worker(worker_id, queue, shutdown, poll_interval).await;
            });
        }
        *tasks = Some(join_set);

        Ok(())
    }

    /// Signal shutdown and wait for every worker loop to exit.
    ///
    /// Jobs already running are allowed to finish; no job is claimed once the
    /// signal is raised.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();

        let tasks = self.inner.tasks.lock().await.take();
        let Some(mut tasks) = tasks else {
            return;
        };

        tracing::info!("Stopping worker pool, waiting for {} worker(s)", tasks.len());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker loop ended abnormally: {}", e);
            }
        }
        tracing::info!("Worker pool stopped");
    }

    /// Number of worker loops still alive.
    pub fn active_workers(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// The token passed to every job; cancelled when the pool stops.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.inner.queue
    }
}

async fn run_worker(
    worker_id: String,
    queue: TaskQueue,
    shutdown: CancellationToken,
    poll_interval: Duration,
) {
    tracing::info!("Worker {} started", worker_id);

    loop {
        tokio::select! {
            // Shutdown wins over another poll.
            biased;

            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let claim = match queue.dequeue(&worker_id, &shutdown).await {
            Ok(Some(claim)) => claim,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Worker {} cannot dequeue, exiting: {}", worker_id, e);
                break;
            }
        };

        let job_id = claim.id();
        if let Err(error) = claim.run(shutdown.clone()).await {
            tracing::debug!("Worker {} continues after job {} failed: {}", worker_id, job_id, error);
        }
    }

    tracing::info!("Worker {} stopped", worker_id);
}
