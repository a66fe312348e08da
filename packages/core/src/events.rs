//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, JobSummary};

/// Events emitted by the task queue as jobs move through their lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A new job entered the buffer.
    JobEnqueued {
        job: JobSummary,
        timestamp: DateTime<Utc>,
    },
    /// A worker claimed a job.
    JobStarted {
        job_id: JobId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A claimed job went back to the front of the queue without running.
    JobRequeued {
        job_id: JobId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A job's work returned successfully.
    JobCompleted {
        job_id: JobId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job's work failed.
    JobFailed {
        job_id: JobId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Pending jobs were discarded without running.
    QueueCleared {
        discarded: usize,
        timestamp: DateTime<Utc>,
    },
    /// Finished job records were dropped.
    HistoryCleared {
        removed: usize,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobEnqueued { timestamp, .. }
            | JobEvent::JobStarted { timestamp, .. }
            | JobEvent::JobRequeued { timestamp, .. }
            | JobEvent::JobCompleted { timestamp, .. }
            | JobEvent::JobFailed { timestamp, .. }
            | JobEvent::QueueCleared { timestamp, .. }
            | JobEvent::HistoryCleared { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::JobEnqueued { job, .. } => Some(job.id),
            JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobRequeued { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. } => Some(*job_id),
            JobEvent::QueueCleared { .. } | JobEvent::HistoryCleared { .. } => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobEnqueued { job, .. } => format!("Job {} '{}' enqueued", job.id, job.name),
            JobEvent::JobStarted {
                job_id, worker_id, ..
            } => format!("Job {} started by {}", job_id, worker_id),
            JobEvent::JobRequeued {
                job_id, worker_id, ..
            } => format!("Job {} returned to the queue by {}", job_id, worker_id),
            JobEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            JobEvent::JobFailed { job_id, error, .. } => {
                format!("Job {} failed: {}", job_id, error)
            }
            JobEvent::QueueCleared { discarded, .. } => {
                format!("Queue cleared, {} pending job(s) discarded", discarded)
            }
            JobEvent::HistoryCleared { removed, .. } => {
                format!("History cleared, {} record(s) removed", removed)
            }
        }
    }
}
