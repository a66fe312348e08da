//! Core domain types for the background task queue.
//!
//! This crate contains shared types used across all packages:
//! - JobRecord and JobStatus for tracked work items
//! - QueueConfig, WorkerPoolConfig and introspection snapshots
//! - Events for real-time updates
//! - QueueError for every fallible queue operation

mod error;
mod events;
mod job;
mod queue;

pub use error::QueueError;
pub use events::JobEvent;
pub use job::{
    DEFAULT_JOB_DESCRIPTION, DEFAULT_JOB_NAME, JobId, JobRecord, JobStatus, JobSummary,
};
pub use queue::{QueueConfig, QueueStats, QueueStatus, ServiceConfig, WorkerPoolConfig};
