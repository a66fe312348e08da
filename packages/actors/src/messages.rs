//! Message types for actor communication.

use queue_core::{JobId, JobSummary, QueueStats, QueueStatus};
use ractor::RpcReplyPort;
use tokio::sync::OwnedSemaphorePermit;

use crate::claim::{ClaimedJob, PendingJob};
use crate::work::NewJob;

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Admit a job into the buffer. The permit holds its slot.
    Enqueue {
        job: Box<NewJob>,
        permit: OwnedSemaphorePermit,
        reply: RpcReplyPort<JobId>,
    },

    /// Wait for the next job on behalf of a worker.
    Dequeue {
        worker_id: String,
        reply: RpcReplyPort<ClaimedJob>,
    },

    /// Return a claim that never reached its worker.
    Release { job: PendingJob },

    /// Report the outcome of a claimed job.
    Finished {
        job_id: JobId,
        worker_id: String,
        outcome: Result<(), String>,
    },

    /// Discard every buffered job.
    Clear { reply: RpcReplyPort<usize> },

    /// Drop finished job records.
    ClearHistory { reply: RpcReplyPort<usize> },

    /// Get the buffer size.
    GetStatus { reply: RpcReplyPort<QueueStatus> },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },

    /// List every retained job record.
    ListJobs { reply: RpcReplyPort<Vec<JobSummary>> },

    /// Get a job by ID.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Option<JobSummary>>,
    },

    /// Get the earliest claimed job still running.
    GetRunning {
        reply: RpcReplyPort<Option<JobSummary>>,
    },

    /// Stop the queue.
    Shutdown,
}
