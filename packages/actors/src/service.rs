//! Lifecycle owner for a queue and its worker pool.

use queue_core::{QueueError, ServiceConfig};

use crate::task_queue::TaskQueue;
use crate::worker_pool::WorkerPool;

/// A running task queue together with the pool draining it.
///
/// Whatever owns the process lifecycle calls [`BackgroundService::start`] at
/// startup and [`BackgroundService::stop`] on the way out.
pub struct BackgroundService {
    queue: TaskQueue,
    pool: WorkerPool,
}

impl BackgroundService {
    /// Validate `config`, spawn the queue and start its workers.
    pub async fn start(config: ServiceConfig) -> Result<Self, QueueError> {
        config.validate()?;
        tracing::info!("Starting background task service");

        let queue = TaskQueue::new(config.queue).await?;
        let pool = WorkerPool::new(queue.clone(), config.pool)?;
        if let Err(e) = pool.start().await {
            queue.shutdown().await;
            return Err(e);
        }

        Ok(Self { queue, pool })
    }

    /// Producer and introspection handle.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Stop the workers, letting running jobs finish, then stop the queue.
    pub async fn stop(&self) {
        tracing::info!("Stopping background task service");
        self.pool.stop().await;
        self.queue.shutdown().await;
    }
}
