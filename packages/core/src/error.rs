//! Error type shared by the queue, the worker pool and their callers.

use thiserror::Error;

use crate::JobId;

/// Errors surfaced by queue and pool operations.
///
/// Failures of a job's own work are not represented here; they are recorded
/// on the job and never returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Queue is shut down")]
    ShutDown,

    #[error("Queue did not answer in time")]
    Timeout,

    #[error("Actor error: {0}")]
    Actor(String),
}
