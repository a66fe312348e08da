//! Queue configuration and introspection types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::QueueError;

/// Configuration for the bounded task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of pending jobs buffered before producers are suspended.
    pub capacity: usize,
    /// Maximum number of finished job records kept for introspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
    /// Upper bound for a single introspection call (milliseconds).
    pub call_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            history_limit: None,
            call_timeout_ms: 5_000,
        }
    }
}

impl QueueConfig {
    /// Create a config with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Cap the number of finished records kept.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Introspection call timeout as a duration.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Reject values the queue cannot run with.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.capacity == 0 {
            return Err(QueueError::InvalidArgument(
                "queue capacity must be at least 1".into(),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(QueueError::InvalidArgument(
                "call timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the worker pool draining a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of concurrent worker loops.
    pub workers: usize,
    /// Pause before each dequeue attempt (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval_ms: 5_000,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a config with the given worker count.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Set the poll interval.
    ///
    /// The interval has millisecond granularity: a non-zero interval shorter
    /// than a millisecond rounds up to one, and oversized values saturate.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.poll_interval_ms = if millis == 0 && !interval.is_zero() {
            1
        } else {
            millis
        };
        self
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values the pool cannot run with.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.workers == 0 {
            return Err(QueueError::InvalidArgument(
                "worker count must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(QueueError::InvalidArgument(
                "poll interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Combined configuration for a queue and its worker pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub queue: QueueConfig,
    pub pool: WorkerPoolConfig,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), QueueError> {
        self.queue.validate()?;
        self.pool.validate()
    }
}

/// Snapshot of the buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Number of buffered jobs, or [`QueueStatus::UNKNOWN`].
    pub queued_count: i64,
}

impl QueueStatus {
    /// Sentinel reported when the count could not be read without blocking.
    pub const UNKNOWN: i64 = -1;

    pub fn new(queued_count: usize) -> Self {
        Self {
            queued_count: queued_count as i64,
        }
    }

    pub fn unknown() -> Self {
        Self {
            queued_count: Self::UNKNOWN,
        }
    }

    pub fn is_known(&self) -> bool {
        self.queued_count != Self::UNKNOWN
    }
}

/// Statistics for a queue's current state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Number of pending jobs.
    pub pending: u64,
    /// Number of running jobs.
    pub running: u64,
    /// Number of completed jobs since the queue started.
    pub completed: u64,
    /// Number of failed jobs since the queue started.
    pub failed: u64,
}

impl QueueStats {
    /// Total jobs in queue (pending + running).
    pub fn active(&self) -> u64 {
        self.pending + self.running
    }

    /// Total processed jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        let err = QueueConfig::with_capacity(0).validate().unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
        assert!(QueueConfig::with_capacity(1).validate().is_ok());
    }

    #[test]
    fn zero_workers_are_rejected() {
        let err = WorkerPoolConfig::with_workers(0).validate().unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
        assert!(WorkerPoolConfig::with_workers(3).validate().is_ok());
    }

    #[test]
    fn poll_interval_keeps_millisecond_granularity() {
        let config = WorkerPoolConfig::default().with_poll_interval(Duration::from_micros(500));
        assert_eq!(config.poll_interval_ms, 1);
        assert!(config.validate().is_ok());

        let config = WorkerPoolConfig::default().with_poll_interval(Duration::MAX);
        assert_eq!(config.poll_interval_ms, u64::MAX);

        let config = WorkerPoolConfig::default().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{ "queue": { "capacity": 2 } }"#).unwrap();
        assert_eq!(config.queue.capacity, 2);
        assert_eq!(config.queue.call_timeout_ms, 5_000);
        assert_eq!(config.pool, WorkerPoolConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_status_uses_sentinel() {
        assert_eq!(QueueStatus::unknown().queued_count, -1);
        assert!(!QueueStatus::unknown().is_known());
        assert!(QueueStatus::new(0).is_known());
    }

    #[test]
    fn success_rate_ignores_unprocessed_queues() {
        let mut stats = QueueStats::default();
        assert_eq!(stats.success_rate(), None);
        stats.completed = 3;
        stats.failed = 1;
        assert_eq!(stats.success_rate(), Some(75.0));
    }
}
