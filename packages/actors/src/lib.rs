//! Actor-backed background task queue.
//!
//! This crate provides the bounded queue that producers submit work to and
//! the worker pool that drains it.
//!
//! # Architecture
//!
//! - `QueueActor` - Owns the FIFO buffer and the job record side table
//! - `TaskQueue` - Cloneable handle for producers and introspection
//! - `WorkerPool` - Worker loops that claim and run jobs
//! - `BackgroundService` - Starts and stops a queue with its pool
//!
//! # Usage
//!
//! ```ignore
//! use actors::{BackgroundService, NewJob};
//! use queue_core::ServiceConfig;
//!
//! let service = BackgroundService::start(ServiceConfig::default()).await?;
//! service
//!     .queue()
//!     .enqueue(NewJob::new(|_token| async { Ok(()) }).with_name("Pull model"))
//!     .await?;
//! service.stop().await;
//! ```

mod claim;
mod messages;
mod queue_actor;
mod service;
mod task_queue;
mod work;
mod worker_pool;

pub use claim::{ClaimedJob, INTERRUPTED_MESSAGE};
pub use service::BackgroundService;
pub use task_queue::TaskQueue;
pub use work::{NewJob, Work, WorkError, WorkFuture, WorkResult};
pub use worker_pool::WorkerPool;

/// Re-export the cancellation token handed to every job.
pub use tokio_util::sync::CancellationToken;
