//! Opaque units of work and the producer-facing job request.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures_util::FutureExt;
use queue_core::{DEFAULT_JOB_DESCRIPTION, DEFAULT_JOB_NAME};
use tokio_util::sync::CancellationToken;

/// Error type returned by failing work.
pub type WorkError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for work.
pub type WorkResult = Result<(), WorkError>;

/// Future type for async work.
pub type WorkFuture = Pin<Box<dyn Future<Output = WorkResult> + Send>>;

/// An asynchronous operation executed at most once by a worker.
///
/// The closure receives the pool's shutdown token and is expected to honor it
/// cooperatively; the worker never aborts it.
pub struct Work(Box<dyn FnOnce(CancellationToken) -> WorkFuture + Send>);

impl Work {
    /// Wrap an async closure.
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Self(Box::new(move |token| Box::pin(work(token))))
    }

    /// Run the work, turning errors and panics into a failure message.
    pub(crate) async fn execute(self, token: CancellationToken) -> Result<(), String> {
        let Work(work) = self;
        match AssertUnwindSafe(async move { work(token).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => {
                let message = error.to_string();
                if message.is_empty() {
                    Err("job failed without an error message".into())
                } else {
                    Err(message)
                }
            }
            Err(payload) => Err(panic_message(payload)),
        }
    }
}

impl std::fmt::Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Work(..)")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("job panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("job panicked: {}", message)
    } else {
        "job panicked".to_string()
    }
}

/// A job as submitted by a producer, before the queue assigns its identity.
#[derive(Debug)]
pub struct NewJob {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) work: Work,
}

impl NewJob {
    /// Create a job with the default name and description.
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Self::from_work(Work::new(work))
    }

    /// Create a job from already wrapped work.
    pub fn from_work(work: Work) -> Self {
        Self {
            name: DEFAULT_JOB_NAME.to_string(),
            description: DEFAULT_JOB_DESCRIPTION.to_string(),
            work,
        }
    }

    /// Set the name for this job.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description for this job.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_becomes_message() {
        let work = Work::new(|_| async { Err("boom".into()) });
        assert_eq!(work.execute(CancellationToken::new()).await, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let work = Work::new(|_| async {
            let fail = true;
            if fail {
                panic!("kaput");
            }
            Ok(())
        });
        let outcome = work.execute(CancellationToken::new()).await;
        assert_eq!(outcome, Err("job panicked: kaput".to_string()));
    }

    #[tokio::test]
    async fn work_sees_the_token() {
        let token = CancellationToken::new();
        token.cancel();
        let work = Work::new(|token: CancellationToken| async move {
            if token.is_cancelled() {
                Ok(())
            } else {
                Err("token was not forwarded".into())
            }
        });
        assert_eq!(work.execute(token).await, Ok(()));
    }

    #[test]
    fn defaults_apply_until_overridden() {
        let job = NewJob::new(|_| async { Ok(()) });
        assert_eq!(job.name(), DEFAULT_JOB_NAME);
        assert_eq!(job.description(), DEFAULT_JOB_DESCRIPTION);

        let job = job.with_name("Pull model").with_description("llama3");
        assert_eq!(job.name(), "Pull model");
        assert_eq!(job.description(), "llama3");
    }
}
