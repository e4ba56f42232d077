// Task workers: pull messages from the backend and run them

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agents::AgentCollaborator;
use crate::analysis::run_analysis_task;
use crate::config::QueueConfig;
use crate::queue::jobs::{AnalyzeReportArgs, TaskMessage, TaskOutcome, ANALYZE_BLOOD_REPORT};
use crate::queue::TaskQueue;

const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Everything a task handler may touch.
#[derive(Clone)]
pub struct TaskContext {
    pub pool: SqlitePool,
    pub agent: Arc<dyn AgentCollaborator>,
    /// Where tasks re-stage documents carried in their arguments.
    pub staging_dir: PathBuf,
}

pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    ctx: TaskContext,
    concurrency: usize,
    poll_timeout: Duration,
}

impl Worker {
    pub fn new(queue: Arc<dyn TaskQueue>, ctx: TaskContext, config: &QueueConfig) -> Self {
        Self {
            queue,
            ctx,
            concurrency: config.worker_concurrency.max(1),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs.max(1)),
        }
    }

    /// Polls until `shutdown` fires. A task already running is finished first.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            backend = self.queue.name(),
            concurrency = self.concurrency,
            "Worker started"
        );

        let worker = Arc::new(self);
        let loops = (0..worker.concurrency).map(|slot| {
            let worker = worker.clone();
            let shutdown = shutdown.clone();
            async move { worker.run_loop(slot, shutdown).await }
        });
        futures::future::join_all(loops).await;

        info!("Worker stopped");
    }

    async fn run_loop(&self, slot: usize, shutdown: CancellationToken) {
        while !shutdown.is_cancelled() {
            match self.queue.dequeue(self.poll_timeout).await {
                Ok(Some(message)) => self.process_message(message).await,
                Ok(None) => {}
                Err(e) => {
                    warn!(slot, error = %e, "Failed to poll task queue");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }
    }

    pub async fn process_message(&self, message: TaskMessage) {
        info!(task_id = %message.id, task = %message.task, "Processing task");

        if let Err(e) = self.queue.mark_running(&message).await {
            warn!(task_id = %message.id, error = %e, "Failed to mark task running");
        }

        let outcome = self.execute(&message).await;
        match &outcome {
            TaskOutcome::Success(_) => info!(task_id = %message.id, "Task succeeded"),
            TaskOutcome::Failure(reason) => {
                warn!(task_id = %message.id, reason = %reason, "Task failed")
            }
        }

        if let Err(e) = self.queue.complete(&message, outcome).await {
            error!(task_id = %message.id, error = %e, "Failed to store task result");
        }
    }

    async fn execute(&self, message: &TaskMessage) -> TaskOutcome {
        let ctx = self.ctx.clone();
        let task = message.task.clone();
        let args = message.args.clone();

        match tokio::spawn(async move { dispatch(&ctx, &task, args).await }).await {
            Ok(Ok(value)) => TaskOutcome::Success(value),
            Ok(Err(e)) => TaskOutcome::Failure(e.to_string()),
            Err(e) => TaskOutcome::Failure(format!("Task panicked: {}", e)),
        }
    }
}

/// Routes a task name to its handler.
pub async fn dispatch(
    ctx: &TaskContext,
    task: &str,
    args: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    match task {
        ANALYZE_BLOOD_REPORT => {
            let args: AnalyzeReportArgs = serde_json::from_value(args)?;
            let outcome = run_analysis_task(ctx, args).await;
            Ok(serde_json::to_value(outcome)?)
        }
        other => anyhow::bail!("Unknown task: {}", other),
    }
}
