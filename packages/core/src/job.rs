//! Job domain types for background work items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::QueueError;

/// Name given to jobs whose producer did not supply one.
pub const DEFAULT_JOB_NAME: &str = "Background Task";

/// Description given to jobs whose producer did not supply one.
pub const DEFAULT_JOB_DESCRIPTION: &str = "A background task in the queue";

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// Terminal variants carry their own timestamps so a record can never report
/// a completion time or error message that disagrees with its status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is buffered and waiting for a worker.
    #[default]
    Pending,
    /// Job has been claimed by a worker.
    Running {
        started_at: DateTime<Utc>,
        worker_id: String,
    },
    /// Job work returned successfully.
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Job work returned an error or panicked.
    Failed {
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
        error: String,
    },
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running { .. } => "running",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// A job record as tracked by the queue's side table.
///
/// The record is the introspectable half of a job; the executable half lives
/// with the queue buffer until a worker claims it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Producer-supplied label.
    pub name: String,
    /// Producer-supplied description.
    pub description: String,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// Current status.
    pub status: JobStatus,
}

impl JobRecord {
    /// Create a new pending record.
    pub fn new(id: JobId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            created_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }

    /// When the job reached a terminal state, if it has.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match &self.status {
            JobStatus::Completed { completed_at, .. } => Some(*completed_at),
            JobStatus::Failed { failed_at, .. } => Some(*failed_at),
            _ => None,
        }
    }

    /// When the job was claimed, if it has been.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match &self.status {
            JobStatus::Pending => None,
            JobStatus::Running { started_at, .. }
            | JobStatus::Completed { started_at, .. }
            | JobStatus::Failed { started_at, .. } => Some(*started_at),
        }
    }

    /// Error message of a failed job.
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Move a pending job to running on behalf of `worker_id`.
    pub fn start(&mut self, worker_id: impl Into<String>) -> Result<(), QueueError> {
        if self.status != JobStatus::Pending {
            return Err(self.bad_transition("running"));
        }
        self.status = JobStatus::Running {
            started_at: Utc::now(),
            worker_id: worker_id.into(),
        };
        Ok(())
    }

    /// Record the outcome of a running job.
    pub fn finish(&mut self, outcome: Result<(), String>) -> Result<(), QueueError> {
        let JobStatus::Running { started_at, .. } = self.status else {
            return Err(self.bad_transition("finished"));
        };
        let now = Utc::now();
        self.status = match outcome {
            Ok(()) => JobStatus::Completed {
                started_at,
                completed_at: now,
            },
            Err(error) => JobStatus::Failed {
                started_at,
                failed_at: now,
                error,
            },
        };
        Ok(())
    }

    /// Roll a claim back to pending.
    ///
    /// Only valid for a claim that never reached a worker, so the work has
    /// not been invoked.
    pub fn unclaim(&mut self) -> Result<(), QueueError> {
        if !matches!(self.status, JobStatus::Running { .. }) {
            return Err(self.bad_transition("pending"));
        }
        self.status = JobStatus::Pending;
        Ok(())
    }

    /// Project the record into its introspection shape.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at(),
            is_completed: matches!(self.status, JobStatus::Completed { .. }),
            is_running: matches!(self.status, JobStatus::Running { .. }),
            is_failed: matches!(self.status, JobStatus::Failed { .. }),
            error_message: self.error_message().map(str::to_owned),
        }
    }

    fn bad_transition(&self, target: &str) -> QueueError {
        QueueError::InvalidState(format!(
            "job {} cannot move from {} to {}",
            self.id,
            self.status.as_str(),
            target
        ))
    }
}

/// Point-in-time view of a job for administrative surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub is_running: bool,
    pub is_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
