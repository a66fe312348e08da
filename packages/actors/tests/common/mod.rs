#![allow(dead_code)]

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{NewJob, TaskQueue};
use queue_core::{JobId, JobSummary, QueueConfig, WorkerPoolConfig};
use tokio::time::{Instant, sleep};

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(10);

/// Labels of executed jobs, in execution order.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

pub async fn queue_with_capacity(capacity: usize) -> Result<TaskQueue, Box<dyn Error>> {
    Ok(TaskQueue::new(QueueConfig::with_capacity(capacity)).await?)
}

pub fn fast_pool(workers: usize) -> WorkerPoolConfig {
    WorkerPoolConfig::with_workers(workers).with_poll_interval(POLL)
}

/// A job that appends its label to `log` when it runs.
pub fn recording_job(label: &str, log: &ExecutionLog) -> NewJob {
    let name = label.to_string();
    let log = Arc::clone(log);
    NewJob::new(move |_| async move {
        log.lock().unwrap().push(name);
        Ok(())
    })
    .with_name(label)
}

/// A job that bumps `counter` each time its work is invoked.
pub fn counting_job(counter: &Arc<AtomicUsize>) -> NewJob {
    let counter = Arc::clone(counter);
    NewJob::new(move |_| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// A job whose work returns `message` as its error.
pub fn failing_job(message: &'static str) -> NewJob {
    NewJob::new(move |_| async move { Err(message.into()) }).with_name("failing")
}

/// Poll a job's summary until `check` accepts it.
pub async fn wait_for_job(
    queue: &TaskQueue,
    job_id: JobId,
    check: impl Fn(&JobSummary) -> bool,
) -> Result<JobSummary, Box<dyn Error>> {
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        if let Ok(summary) = queue.describe_queue_item(job_id).await
            && check(&summary)
        {
            return Ok(summary);
        }
        if Instant::now() >= deadline {
            return Err(format!("job {} did not reach the expected state", job_id).into());
        }
        sleep(POLL).await;
    }
}

pub async fn wait_until_finished(
    queue: &TaskQueue,
    job_id: JobId,
) -> Result<JobSummary, Box<dyn Error>> {
    wait_for_job(queue, job_id, |job| job.is_completed || job.is_failed).await
}
