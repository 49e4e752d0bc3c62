//! Lease loop with bounded concurrency.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ffq_queue::{FailOutcome, LeasedTask, TaskQueue, FFMPEG_QUEUE};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::processor::CommandProcessor;

/// How often stale leases are reclaimed.
const CLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Idle sleep when the queue is empty or all slots are busy.
const IDLE_SLEEP: Duration = Duration::from_millis(500);

/// Leases tasks from the `ffmpeg` queue and runs them on a bounded pool.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<TaskQueue>,
    processor: Arc<CommandProcessor>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    cancel: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: TaskQueue, processor: CommandProcessor) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.concurrency));
        let (shutdown, _) = watch::channel(false);
        let (cancel, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            processor: Arc::new(processor),
            job_semaphore,
            shutdown,
            cancel,
            consumer_name,
        }
    }

    /// Run until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "starting executor '{}' (concurrency={})",
            self.consumer_name, self.config.concurrency
        );

        // Periodically reclaim leases from crashed or wedged workers.
        let claim_queue = Arc::clone(&self.queue);
        let mut claim_shutdown = self.shutdown.subscribe();
        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLAIM_INTERVAL);
            loop {
                tokio::select! {
                    _ = claim_shutdown.changed() => {
                        if *claim_shutdown.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = claim_queue.claim_stale(FFMPEG_QUEUE).await {
                            warn!("failed to reclaim stale leases: {e}");
                        }
                    }
                }
            }
        });

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_one() => {
                    if let Err(e) = result {
                        error!("error consuming tasks: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("waiting for in-flight tasks to complete...");
        if tokio::time::timeout(Duration::from_secs(60), self.wait_for_tasks())
            .await
            .is_err()
        {
            // Give up waiting and cancel whatever is still running.
            let _ = self.cancel.send(true);
        }

        info!("executor stopped");
        Ok(())
    }

    async fn consume_one(&self) -> WorkerResult<()> {
        if self.job_semaphore.available_permits() == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let Some(task) = self.queue.dequeue(FFMPEG_QUEUE, &self.consumer_name).await? else {
            tokio::time::sleep(IDLE_SLEEP).await;
            return Ok(());
        };

        let permit = self
            .job_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Execution("semaphore closed".to_string()))?;

        let queue = Arc::clone(&self.queue);
        let processor = Arc::clone(&self.processor);
        let cancel_rx = self.cancel.subscribe();
        tokio::spawn(async move {
            let _permit = permit;
            Self::execute_task(processor, queue, task, cancel_rx).await;
        });

        Ok(())
    }

    /// Run one task and report the outcome to the broker.
    async fn execute_task(
        processor: Arc<CommandProcessor>,
        queue: Arc<TaskQueue>,
        task: LeasedTask,
        cancel_rx: watch::Receiver<bool>,
    ) {
        let command_id = task.id.clone();
        debug!(command_id = %command_id, "executing task");

        let timeout = task.timeout;
        let outcome =
            tokio::time::timeout(timeout, processor.process(&task, cancel_rx)).await;

        match outcome {
            Ok(Ok(outcome)) => {
                let result_bytes = match serde_json::to_vec(&outcome.result) {
                    Ok(b) => b,
                    Err(e) => {
                        error!(command_id = %command_id, "failed to serialize result: {e}");
                        let _ = queue
                            .fail(FFMPEG_QUEUE, &command_id, &format!("serialize result: {e}"))
                            .await;
                        return;
                    }
                };

                if let Err(e) = queue
                    .complete(FFMPEG_QUEUE, &command_id, Some(&result_bytes))
                    .await
                {
                    error!(command_id = %command_id, "failed to record result: {e}");
                    return;
                }

                // Result precedes notification enqueue.
                processor
                    .enqueue_notification(&queue, &command_id, &outcome)
                    .await;
            }
            Ok(Err(e)) if e.is_resource() => {
                if let Err(qe) = queue
                    .retry_later(FFMPEG_QUEUE, &command_id, &e.to_string(), false)
                    .await
                {
                    error!(command_id = %command_id, "failed to defer task: {qe}");
                }
            }
            Ok(Err(e)) if e.is_unrecoverable() => {
                error!(command_id = %command_id, "unrecoverable failure: {e}");
                if let Err(qe) = queue.archive(FFMPEG_QUEUE, &command_id, &e.to_string()).await {
                    error!(command_id = %command_id, "failed to archive task: {qe}");
                }
            }
            Ok(Err(e)) => {
                error!(command_id = %command_id, "task failed: {e}");
                Self::report_failure(&queue, &command_id, &e.to_string()).await;
            }
            Err(_) => {
                // The processing future was dropped; the workspace guard and
                // kill_on_drop already cleaned up.
                let msg = format!(
                    "command cancelled: task timeout after {}s",
                    timeout.as_secs()
                );
                error!(command_id = %command_id, "{msg}");
                Self::report_failure(&queue, &command_id, &msg).await;
            }
        }
    }

    async fn report_failure(queue: &TaskQueue, command_id: &str, err: &str) {
        match queue.fail(FFMPEG_QUEUE, command_id, err).await {
            Ok(FailOutcome::Retrying) => {
                info!(command_id = %command_id, "task will be retried");
            }
            Ok(FailOutcome::Archived) => {
                warn!(command_id = %command_id, "task archived after exhausting retries");
            }
            Err(e) => error!(command_id = %command_id, "failed to report failure: {e}"),
        }
    }

    async fn wait_for_tasks(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.concurrency {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
