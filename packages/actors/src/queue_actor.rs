//! Queue actor owning the job buffer and the job record side table.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use queue_core::{
    JobEvent, JobId, JobRecord, JobStatus, JobSummary, QueueConfig, QueueStats, QueueStatus,
};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tokio::sync::broadcast;

use crate::claim::{ClaimedJob, PendingJob};
use crate::messages::QueueMessage;
use crate::work::NewJob;

/// A worker parked until a job arrives.
struct Waiter {
    worker_id: String,
    reply: RpcReplyPort<ClaimedJob>,
}

/// State for the queue actor.
///
/// `buffer` holds what still has to run; `records` holds what introspection
/// sees. Reading records never touches the buffer.
pub struct QueueActorState {
    config: QueueConfig,
    /// Pending jobs in FIFO order.
    buffer: VecDeque<PendingJob>,
    /// Workers waiting for a job, in arrival order.
    waiting: VecDeque<Waiter>,
    /// Every retained job record by ID.
    records: HashMap<JobId, JobRecord>,
    /// Record IDs in enqueue order.
    order: VecDeque<JobId>,
    /// Running job IDs in claim order.
    running: Vec<JobId>,
    completed: u64,
    failed: u64,
    /// Event broadcaster.
    event_tx: broadcast::Sender<JobEvent>,
}

impl QueueActorState {
    /// Create a new queue actor state.
    pub fn new(config: QueueConfig, event_tx: broadcast::Sender<JobEvent>) -> Self {
        Self {
            config,
            buffer: VecDeque::new(),
            waiting: VecDeque::new(),
            records: HashMap::new(),
            order: VecDeque::new(),
            running: Vec::new(),
            completed: 0,
            failed: 0,
            event_tx,
        }
    }

    /// Broadcast an event. Having no subscribers is fine.
    fn broadcast(&self, event: JobEvent) {
        let _ = self.event_tx.send(event);
    }

    fn admit(&mut self, job: NewJob, permit: tokio::sync::OwnedSemaphorePermit) -> JobId {
        let NewJob {
            name,
            description,
            work,
        } = job;
        let id = JobId::new();
        let record = JobRecord::new(id, name, description);
        let summary = record.summary();

        self.records.insert(id, record);
        self.order.push_back(id);
        self.buffer.push_back(PendingJob { id, work, permit });

        tracing::debug!("Job {} '{}' enqueued ({} buffered)", id, summary.name, self.buffer.len());
        self.broadcast(JobEvent::JobEnqueued {
            job: summary,
            timestamp: Utc::now(),
        });
        id
    }

    /// Park a worker until a job arrives, dropping waiters that gave up.
    fn park(&mut self, worker_id: String, reply: RpcReplyPort<ClaimedJob>) {
        self.waiting.retain(|waiter| !waiter.reply.is_closed());
        self.waiting.push_back(Waiter { worker_id, reply });
    }

    /// Hand buffered jobs to parked workers, oldest first on both sides.
    fn dispatch(&mut self, myself: &ActorRef<QueueMessage>) {
        while !self.buffer.is_empty() {
            let Some(waiter) = self.waiting.pop_front() else {
                break;
            };
            if waiter.reply.is_closed() {
                tracing::debug!("Worker {} stopped waiting", waiter.worker_id);
                continue;
            }
            let Some(job) = self.buffer.pop_front() else {
                break;
            };

            let name = match self.records.get_mut(&job.id) {
                Some(record) => match record.start(&waiter.worker_id) {
                    Ok(()) => record.name.clone(),
                    Err(e) => {
                        tracing::error!("Dropping job {}: {}", job.id, e);
                        self.waiting.push_front(waiter);
                        continue;
                    }
                },
                None => {
                    tracing::error!("Dropping job {} without a record", job.id);
                    self.waiting.push_front(waiter);
                    continue;
                }
            };

            let job_id = job.id;
            self.running.push(job_id);
            self.broadcast(JobEvent::JobStarted {
                job_id,
                worker_id: waiter.worker_id.clone(),
                timestamp: Utc::now(),
            });

            let claim = ClaimedJob::new(job, name, waiter.worker_id, myself.clone());
            // An undeliverable claim is dropped here and comes back as Release.
            let _ = waiter.reply.send(claim);
        }
    }

    fn release(&mut self, job: PendingJob) {
        self.running.retain(|id| *id != job.id);
        match self.records.get_mut(&job.id) {
            Some(record) => {
                let worker_id = match &record.status {
                    JobStatus::Running { worker_id, .. } => Some(worker_id.clone()),
                    _ => None,
                };
                if let Err(e) = record.unclaim() {
                    tracing::warn!("Released job {} was not running: {}", job.id, e);
                }
                tracing::debug!("Job {} returned to the front of the queue", job.id);
                let job_id = job.id;
                self.buffer.push_front(job);
                if let Some(worker_id) = worker_id {
                    self.broadcast(JobEvent::JobRequeued {
                        job_id,
                        worker_id,
                        timestamp: Utc::now(),
                    });
                }
            }
            None => tracing::warn!("Released job {} has no record, discarding", job.id),
        }
    }

    fn finish(&mut self, job_id: JobId, worker_id: &str, outcome: Result<(), String>) {
        self.running.retain(|id| *id != job_id);

        let Some(record) = self.records.get_mut(&job_id) else {
            tracing::warn!("Worker {} finished unknown job {}", worker_id, job_id);
            return;
        };
        if let Err(e) = record.finish(outcome.clone()) {
            tracing::warn!("Failed to record outcome of job {}: {}", job_id, e);
            return;
        }
        let duration_ms = match (record.started_at(), record.completed_at()) {
            (Some(started), Some(finished)) => (finished - started).num_milliseconds().max(0) as u64,
            _ => 0,
        };

        let now = Utc::now();
        match outcome {
            Ok(()) => {
                self.completed += 1;
                self.broadcast(JobEvent::JobCompleted {
                    job_id,
                    duration_ms,
                    timestamp: now,
                });
            }
            Err(error) => {
                self.failed += 1;
                self.broadcast(JobEvent::JobFailed {
                    job_id,
                    error,
                    timestamp: now,
                });
            }
        }

        self.enforce_history_limit();
    }

    fn remove_record(&mut self, job_id: JobId) {
        self.records.remove(&job_id);
        self.order.retain(|id| *id != job_id);
    }

    fn finished_ids(&self) -> Vec<JobId> {
        self.order
            .iter()
            .filter(|id| {
                self.records
                    .get(id)
                    .is_some_and(|record| record.status.is_terminal())
            })
            .copied()
            .collect()
    }

    fn enforce_history_limit(&mut self) {
        let Some(limit) = self.config.history_limit else {
            return;
        };
        let finished = self.finished_ids();
        let excess = finished.len().saturating_sub(limit);
        for job_id in finished.into_iter().take(excess) {
            tracing::debug!("Evicting finished job {} from history", job_id);
            self.remove_record(job_id);
        }
    }

    fn clear(&mut self) -> usize {
        let discarded: Vec<PendingJob> = self.buffer.drain(..).collect();
        for job in &discarded {
            self.remove_record(job.id);
        }
        let count = discarded.len();
        // Dropping the jobs frees their slots for suspended producers.
        drop(discarded);

        if count > 0 {
            tracing::info!("Cleared {} pending job(s)", count);
            self.broadcast(JobEvent::QueueCleared {
                discarded: count,
                timestamp: Utc::now(),
            });
        }
        count
    }

    fn clear_history(&mut self) -> usize {
        let finished = self.finished_ids();
        let count = finished.len();
        for job_id in finished {
            self.remove_record(job_id);
        }

        if count > 0 {
            tracing::info!("Removed {} finished job record(s)", count);
            self.broadcast(JobEvent::HistoryCleared {
                removed: count,
                timestamp: Utc::now(),
            });
        }
        count
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.buffer.len() as u64,
            running: self.running.len() as u64,
            completed: self.completed,
            failed: self.failed,
        }
    }

    fn summaries(&self) -> Vec<JobSummary> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(JobRecord::summary)
            .collect()
    }

    fn running_summary(&self) -> Option<JobSummary> {
        self.running
            .first()
            .and_then(|id| self.records.get(id))
            .map(JobRecord::summary)
    }
}

/// Queue actor that serializes every buffer and record mutation.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting task queue (capacity {})", args.config.capacity);
        Ok(args)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            "Task queue stopped ({} pending job(s) dropped, {} running)",
            state.buffer.len(),
            state.running.len()
        );
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue { job, permit, reply } => {
                let job_id = state.admit(*job, permit);
                let _ = reply.send(job_id);
                state.dispatch(&myself);
            }

            QueueMessage::Dequeue { worker_id, reply } => {
                state.park(worker_id, reply);
                state.dispatch(&myself);
            }

            QueueMessage::Release { job } => {
                state.release(job);
                state.dispatch(&myself);
            }

            QueueMessage::Finished {
                job_id,
                worker_id,
                outcome,
            } => {
                state.finish(job_id, &worker_id, outcome);
            }

            QueueMessage::Clear { reply } => {
                let _ = reply.send(state.clear());
            }

            QueueMessage::ClearHistory { reply } => {
                let _ = reply.send(state.clear_history());
            }

            QueueMessage::GetStatus { reply } => {
                let _ = reply.send(QueueStatus::new(state.buffer.len()));
            }

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.stats());
            }

            QueueMessage::ListJobs { reply } => {
                let _ = reply.send(state.summaries());
            }

            QueueMessage::GetJob { job_id, reply } => {
                let _ = reply.send(state.records.get(&job_id).map(JobRecord::summary));
            }

            QueueMessage::GetRunning { reply } => {
                let _ = reply.send(state.running_summary());
            }

            QueueMessage::Shutdown => {
                tracing::info!("Shutting down task queue");
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}
