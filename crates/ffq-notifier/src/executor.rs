//! Delivery lease loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ffq_queue::{FailOutcome, LeasedTask, TaskQueue, WEBHOOKS_QUEUE};

use crate::config::NotifierConfig;
use crate::deliver::WebhookDeliverer;
use crate::error::{NotifierError, NotifierResult};

/// How often stale leases are reclaimed.
const CLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Idle sleep when the queue is empty or all slots are busy.
const IDLE_SLEEP: Duration = Duration::from_millis(500);

/// Leases notification tasks and hands them to the deliverer.
pub struct NotifierExecutor {
    config: NotifierConfig,
    queue: Arc<TaskQueue>,
    deliverer: Arc<WebhookDeliverer>,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl NotifierExecutor {
    pub fn new(config: NotifierConfig, queue: TaskQueue) -> NotifierResult<Self> {
        let deliverer = WebhookDeliverer::new(config.http_timeout)?;
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("notifier-{}", Uuid::new_v4());

        Ok(Self {
            config,
            queue: Arc::new(queue),
            deliverer: Arc::new(deliverer),
            semaphore,
            shutdown,
            consumer_name,
        })
    }

    pub async fn run(&self) -> NotifierResult<()> {
        info!(
            "starting notifier '{}' (concurrency={}, http_timeout={}s)",
            self.consumer_name,
            self.config.concurrency,
            self.config.http_timeout.as_secs()
        );

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
                        if let Err(e) = claim_queue.claim_stale(WEBHOOKS_QUEUE).await {
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
                        info!("shutdown signal received, stopping notifier");
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
        info!("notifier stopped");
        Ok(())
    }

    async fn consume_one(&self) -> NotifierResult<()> {
        if self.semaphore.available_permits() == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let Some(task) = self.queue.dequeue(WEBHOOKS_QUEUE, &self.consumer_name).await? else {
            tokio::time::sleep(IDLE_SLEEP).await;
            return Ok(());
        };

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| NotifierError::Transport("semaphore closed".to_string()))?;

        let queue = Arc::clone(&self.queue);
        let deliverer = Arc::clone(&self.deliverer);
        tokio::spawn(async move {
            let _permit = permit;
            Self::deliver_task(deliverer, queue, task).await;
        });

        Ok(())
    }

    async fn deliver_task(
        deliverer: Arc<WebhookDeliverer>,
        queue: Arc<TaskQueue>,
        task: LeasedTask,
    ) {
        let task_id = task.id.clone();
        debug!(task_id = %task_id, "delivering webhook task");

        match deliverer.deliver_payload(&task.payload).await {
            Ok(status) => {
                let record = serde_json::json!({
                    "status": status,
                    "delivered_at": Utc::now(),
                });
                let record = serde_json::to_vec(&record).unwrap_or_default();
                if let Err(e) = queue
                    .complete(WEBHOOKS_QUEUE, &task_id, Some(&record))
                    .await
                {
                    error!(task_id = %task_id, "failed to complete webhook task: {e}");
                }
            }
            Err(e) if e.is_unrecoverable() => {
                error!(task_id = %task_id, "undecodable webhook task: {e}");
                if let Err(qe) = queue.archive(WEBHOOKS_QUEUE, &task_id, &e.to_string()).await {
                    error!(task_id = %task_id, "failed to archive webhook task: {qe}");
                }
            }
            Err(e) => match queue.fail(WEBHOOKS_QUEUE, &task_id, &e.to_string()).await {
                Ok(FailOutcome::Retrying) => {
                    debug!(task_id = %task_id, "delivery will be retried");
                }
                Ok(FailOutcome::Archived) => {
                    warn!(task_id = %task_id, "delivery dead-lettered after exhausting retries");
                }
                Err(qe) => error!(task_id = %task_id, "failed to report delivery failure: {qe}"),
            },
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
