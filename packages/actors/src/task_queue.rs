//! Producer and introspection handle for the bounded task queue.

use std::sync::Arc;
use std::time::Duration;

use queue_core::{JobEvent, JobId, JobSummary, QueueConfig, QueueError, QueueStats, QueueStatus};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef, RpcReplyPort};
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::claim::ClaimedJob;
use crate::messages::QueueMessage;
use crate::queue_actor::{QueueActor, QueueActorState};
use crate::work::NewJob;

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Bounded, multi-producer/multi-consumer queue of background jobs.
///
/// Cloning is cheap; every clone talks to the same queue actor. Producers are
/// throttled by a fair semaphore holding one permit per free buffer slot.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<TaskQueueRef>,
}

struct TaskQueueRef {
    actor: ActorRef<QueueMessage>,
    slots: Arc<Semaphore>,
    events: broadcast::Sender<JobEvent>,
    capacity: usize,
    call_timeout: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Spawn a queue with the given configuration.
    ///
    /// Fails with `InvalidArgument` for a zero capacity.
    pub async fn new(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        if config.capacity > Semaphore::MAX_PERMITS {
            return Err(QueueError::InvalidArgument(format!(
                "queue capacity must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let capacity = config.capacity;
        let call_timeout = config.call_timeout();
        let state = QueueActorState::new(config, events.clone());

        let (actor, handle) = Actor::spawn(None, QueueActor, state)
            .await
            .map_err(|e| QueueError::Actor(format!("Failed to spawn queue: {}", e)))?;

        Ok(Self {
            inner: Arc::new(TaskQueueRef {
                actor,
                slots: Arc::new(Semaphore::new(capacity)),
                events,
                capacity,
                call_timeout,
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Maximum number of buffered jobs.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Add a job to the queue, waiting for a free slot while the queue is full.
    ///
    /// Never fails because the queue is full; only a shut down queue is an
    /// error.
    pub async fn enqueue(&self, job: NewJob) -> Result<JobId, QueueError> {
        if self.inner.slots.available_permits() == 0 {
            tracing::debug!("Queue full, '{}' waits for a free slot", job.name());
        }
        let permit = self
            .inner
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| QueueError::ShutDown)?;

        self.call(
            |reply| QueueMessage::Enqueue {
                job: Box::new(job),
                permit,
                reply,
            },
            None,
        )
        .await
    }

    /// Wait for the next job and claim it for `worker_id`.
    ///
    /// Returns `Ok(None)` as soon as `cancel` fires. The returned claim is
    /// already marked running.
    pub async fn dequeue(
        &self,
        worker_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ClaimedJob>, QueueError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let (tx, rx) = ractor::concurrency::oneshot();
        self.inner
            .actor
            .send_message(QueueMessage::Dequeue {
                worker_id: worker_id.to_string(),
                reply: tx.into(),
            })
            .map_err(|_| QueueError::ShutDown)?;

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Ok(None),
            claim = rx => claim.map(Some).map_err(|_| QueueError::ShutDown),
        }
    }

    /// Discard every buffered job without running it.
    ///
    /// Running jobs are not affected. Returns the number of discarded jobs.
    pub async fn clear(&self) -> Result<usize, QueueError> {
        self.call(|reply| QueueMessage::Clear { reply }, Some(self.inner.call_timeout))
            .await
    }

    /// Drop completed and failed job records.
    pub async fn clear_history(&self) -> Result<usize, QueueError> {
        self.call(
            |reply| QueueMessage::ClearHistory { reply },
            Some(self.inner.call_timeout),
        )
        .await
    }

    /// Number of buffered jobs, or the unknown sentinel when the queue cannot
    /// answer.
    pub async fn describe_queue(&self) -> QueueStatus {
        match self
            .call(
                |reply| QueueMessage::GetStatus { reply },
                Some(self.inner.call_timeout),
            )
            .await
        {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!("Queue size unavailable: {}", e);
                QueueStatus::unknown()
            }
        }
    }

    /// Snapshot of every retained job, in enqueue order.
    pub async fn describe_queue_items(&self) -> Result<Vec<JobSummary>, QueueError> {
        self.call(
            |reply| QueueMessage::ListJobs { reply },
            Some(self.inner.call_timeout),
        )
        .await
    }

    /// Snapshot of one job.
    pub async fn describe_queue_item(&self, job_id: JobId) -> Result<JobSummary, QueueError> {
        self.call(
            |reply| QueueMessage::GetJob { job_id, reply },
            Some(self.inner.call_timeout),
        )
        .await?
        .ok_or(QueueError::NotFound(job_id))
    }

    /// Snapshot of the earliest claimed job that is still running.
    pub async fn describe_running_item(&self) -> Result<JobSummary, QueueError> {
        self.call(
            |reply| QueueMessage::GetRunning { reply },
            Some(self.inner.call_timeout),
        )
        .await?
        .ok_or_else(|| QueueError::InvalidState("no job is currently running".into()))
    }

    /// Current queue statistics.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        self.call(
            |reply| QueueMessage::GetStats { reply },
            Some(self.inner.call_timeout),
        )
        .await
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the queue refuses new jobs.
    pub fn is_shut_down(&self) -> bool {
        self.inner.slots.is_closed()
    }

    /// Stop accepting jobs and stop the queue actor.
    ///
    /// Producers waiting for a slot fail with `ShutDown`; buffered jobs are
    /// dropped without running.
    pub async fn shutdown(&self) {
        self.inner.slots.close();
        if self
            .inner
            .actor
            .send_message(QueueMessage::Shutdown)
            .is_err()
        {
            tracing::debug!("Task queue already stopped");
        }

        let handle = self.inner.handle.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!("Task queue actor ended abnormally: {}", e);
        }
    }

    async fn call<T, F>(&self, build: F, timeout: Option<Duration>) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> QueueMessage,
    {
        match ractor::rpc::call(&self.inner.actor, build, timeout).await {
            Ok(CallResult::Success(value)) => Ok(value),
            Ok(CallResult::Timeout) => Err(QueueError::Timeout),
            Ok(CallResult::SenderError) | Err(_) => Err(QueueError::ShutDown),
        }
    }
}
