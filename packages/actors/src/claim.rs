//! Buffered jobs and the claims handed to workers.

use std::time::Instant;

use queue_core::JobId;
use ractor::ActorRef;
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use crate::messages::QueueMessage;
use crate::work::Work;

/// The executable half of a job while it sits in the buffer.
///
/// Dropping it releases its buffer slot.
#[derive(Debug)]
pub struct PendingJob {
    pub(crate) id: JobId,
    pub(crate) work: Work,
    pub(crate) permit: OwnedSemaphorePermit,
}

/// A job claimed by exactly one worker.
///
/// The queue has already marked the job running. Calling [`ClaimedJob::run`]
/// executes the work and reports the outcome. A claim dropped without being
/// run goes back to the front of the queue; one dropped while its work is
/// executing is recorded as failed.
pub struct ClaimedJob {
    id: JobId,
    name: String,
    worker_id: String,
    job: Option<PendingJob>,
    /// Set while the work executes and its outcome is not yet reported.
    in_flight: bool,
    queue: ActorRef<QueueMessage>,
}

/// Failure recorded for a job whose execution was dropped before finishing.
pub const INTERRUPTED_MESSAGE: &str = "job execution was interrupted";

impl ClaimedJob {
    pub(crate) fn new(
        job: PendingJob,
        name: String,
        worker_id: String,
        queue: ActorRef<QueueMessage>,
    ) -> Self {
        Self {
            id: job.id,
            name,
            worker_id,
            job: Some(job),
            in_flight: false,
            queue,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Execute the job and record its outcome on the queue.
    ///
    /// Work errors and panics come back as `Err(message)`; they are already
    /// recorded on the job and need no further handling.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), String> {
        let Some(PendingJob { work, permit, .. }) = self.job.take() else {
            return Err(format!("claim on job {} was already consumed", self.id));
        };
        self.in_flight = true;
        drop(permit);

        tracing::info!(
            "Worker {} running job {} '{}'",
            self.worker_id,
            self.id,
            self.name
        );
        let started = Instant::now();
        let outcome = work.execute(token).await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(()) => tracing::info!("Job {} completed in {:?}", self.id, elapsed),
            Err(error) => tracing::warn!("Job {} failed after {:?}: {}", self.id, elapsed, error),
        }

        self.in_flight = false;
        self.report(outcome.clone());
        outcome
    }

    fn report(&self, outcome: Result<(), String>) {
        if let Err(e) = self.queue.send_message(QueueMessage::Finished {
            job_id: self.id,
            worker_id: self.worker_id.clone(),
            outcome,
        }) {
            tracing::warn!("Failed to record outcome of job {}: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for ClaimedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimedJob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("worker_id", &self.worker_id)
            .field("consumed", &self.job.is_none())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl Drop for ClaimedJob {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            tracing::debug!(
                "Claim on job {} dropped before running, returning it to the queue",
                job.id
            );
            if self.queue.send_message(QueueMessage::Release { job }).is_err() {
                tracing::debug!("Queue already stopped, job {} discarded", self.id);
            }
        } else if self.in_flight {
            self.in_flight = false;
            tracing::warn!(
                "Worker {} dropped job {} while it was running",
                self.worker_id,
                self.id
            );
            self.report(Err(INTERRUPTED_MESSAGE.to_string()));
        }
    }
}
