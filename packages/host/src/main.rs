//! Host process for the background task queue.
//!
//! Starts the queue and its workers, submits a few demo jobs, logs every
//! lifecycle event and shuts down cleanly on Ctrl-C.

mod config;

use std::time::Duration;

use actors::{BackgroundService, NewJob, TaskQueue};
use queue_core::JobEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::from_env()?;
    tracing::info!(
        capacity = config.queue.capacity,
        workers = config.pool.workers,
        poll_interval_ms = config.pool.poll_interval_ms,
        "Initializing task queue host..."
    );

    let service = BackgroundService::start(config).await?;
    let events = tokio::spawn(log_events(service.queue().clone()));

    submit_demo_jobs(service.queue()).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    let status = service.queue().describe_queue().await;
    if let Ok(stats) = service.queue().stats().await {
        tracing::info!(
            queued = status.queued_count,
            completed = stats.completed,
            failed = stats.failed,
            "Final queue state"
        );
    }

    service.stop().await;
    events.abort();
    Ok(())
}

async fn log_events(queue: TaskQueue) {
    let mut rx = queue.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event logger lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &JobEvent) {
    match event {
        JobEvent::JobFailed { .. } => tracing::warn!("{}", event.description()),
        _ => tracing::info!("{}", event.description()),
    }
    if let Ok(json) = serde_json::to_string(event) {
        tracing::debug!(event = %json, "Job event");
    }
}

async fn submit_demo_jobs(queue: &TaskQueue) -> Result<(), queue_core::QueueError> {
    queue
        .enqueue(
            NewJob::new(|_| async {
                tracing::info!("Echo job: hello from the task queue");
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .with_name("Echo")
            .with_description("Logs a greeting"),
        )
        .await?;

    queue
        .enqueue(
            NewJob::new(|token| async move {
                let seconds = 5;
                tracing::info!("Sleeping for {} seconds", seconds);
                tokio::select! {
                    _ = token.cancelled() => Err("sleep interrupted by shutdown".into()),
                    _ = tokio::time::sleep(Duration::from_secs(seconds)) => Ok(()),
                }
            })
            .with_name("Sleep")
            .with_description("Sleeps unless the host is shutting down"),
        )
        .await?;

    queue
        .enqueue(
            NewJob::new(|_| async { Err("Intentional failure".into()) })
                .with_name("Fail")
                .with_description("Always fails"),
        )
        .await?;

    Ok(())
}
