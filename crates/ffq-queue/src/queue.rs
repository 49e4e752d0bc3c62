//! Redis-backed task queue client.
//!
//! Layout per queue `q` (prefix `ffq`):
//!   `ffq:q:t:<id>`    hash: payload, state, retried, max_retry, timeout_secs,
//!                     retention_secs, last_error, result, enqueued_at,
//!                     next_process_at, completed_at
//!   `ffq:q:pending`   list of task ids, FIFO
//!   `ffq:q:active`    list of leased task ids
//!   `ffq:q:lease`     zset id -> lease deadline (epoch secs)
//!   `ffq:q:retry`     zset id -> next visible at (epoch secs)
//!   `ffq:q:completed` zset id -> completion time
//!   `ffq:q:archived`  zset id -> archive time
//!
//! Terminal hashes carry a TTL equal to the task's retention window; zset
//! entries whose hash has expired are pruned lazily during listings.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::task::{backoff_delay, EnqueueOpts, FailOutcome, LeasedTask, TaskInfo, TaskState};

/// Extra slack on top of the task timeout before a lease counts as lost.
const LEASE_GRACE: Duration = Duration::from_secs(60);

/// How many due retry tasks are promoted per dequeue pass.
const PROMOTE_BATCH: isize = 100;

/// Queue client configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config from `REDIS_ADDR` / `REDIS_PASSWORD` / `REDIS_DB`.
    pub fn from_env() -> Self {
        let addr = std::env::var("REDIS_ADDR").unwrap_or_else(|_| "localhost:6379".to_string());
        let password = std::env::var("REDIS_PASSWORD").unwrap_or_default();
        let db: u32 = std::env::var("REDIS_DB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let redis_url = if password.is_empty() {
            format!("redis://{addr}/{db}")
        } else {
            format!("redis://:{password}@{addr}/{db}")
        };

        Self { redis_url }
    }
}

/// Task queue client.
pub struct TaskQueue {
    client: redis::Client,
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Verify the broker is reachable. Services call this at startup and
    /// exit non-zero when it fails.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(QueueError::connection_failed(format!(
                "unexpected PING reply: {pong}"
            )));
        }
        Ok(())
    }

    /// Enqueue a task and return its broker-assigned id.
    pub async fn enqueue(
        &self,
        queue: &str,
        payload: &[u8],
        opts: EnqueueOpts,
    ) -> QueueResult<String> {
        let mut conn = self.conn().await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(task_key(queue, &id))
            .arg("payload")
            .arg(payload)
            .arg("state")
            .arg(TaskState::Pending.as_str())
            .arg("retried")
            .arg(0)
            .arg("max_retry")
            .arg(opts.max_retry)
            .arg("timeout_secs")
            .arg(opts.timeout.as_secs())
            .arg("retention_secs")
            .arg(opts.retention.as_secs())
            .arg("last_error")
            .arg("")
            .arg("result")
            .arg("")
            .arg("enqueued_at")
            .arg(&now)
            .arg("next_process_at")
            .arg(&now)
            .arg("completed_at")
            .arg("")
            .ignore()
            .cmd("RPUSH")
            .arg(state_key(queue, "pending"))
            .arg(&id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(queue, task_id = %id, "enqueued task");
        Ok(id)
    }

    /// Lease the next task, if any. Due retry tasks are promoted first.
    pub async fn dequeue(&self, queue: &str, consumer: &str) -> QueueResult<Option<LeasedTask>> {
        let mut conn = self.conn().await?;

        self.promote_due(&mut conn, queue).await?;

        let id: Option<String> = redis::cmd("LMOVE")
            .arg(state_key(queue, "pending"))
            .arg(state_key(queue, "active"))
            .arg("LEFT")
            .arg("RIGHT")
            .query_async(&mut conn)
            .await?;

        let Some(id) = id else {
            return Ok(None);
        };

        let fields: HashMap<String, String> = conn.hgetall(task_key(queue, &id)).await?;
        if fields.is_empty() {
            // Hash already reaped; drop the dangling list entry.
            let _: () = conn.lrem(state_key(queue, "active"), 0, &id).await?;
            return Ok(None);
        }

        let timeout_secs: u64 = fields
            .get("timeout_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(EnqueueOpts::default().timeout.as_secs());
        let timeout = Duration::from_secs(timeout_secs);
        let retried: u32 = fields
            .get("retried")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let payload = fields
            .get("payload")
            .cloned()
            .unwrap_or_default()
            .into_bytes();

        let deadline = Utc::now().timestamp() + (timeout + LEASE_GRACE).as_secs() as i64;
        redis::pipe()
            .atomic()
            .hset(task_key(queue, &id), "state", TaskState::Active.as_str())
            .ignore()
            .zadd(state_key(queue, "lease"), &id, deadline)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(queue, task_id = %id, consumer, "leased task");
        Ok(Some(LeasedTask {
            id,
            payload,
            retried,
            timeout,
        }))
    }

    /// Mark a task completed and write its append-once result slot.
    pub async fn complete(
        &self,
        queue: &str,
        id: &str,
        result: Option<&[u8]>,
    ) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let retention = self.retention_secs(&mut conn, queue, id).await?;
        let now = Utc::now();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .lrem(state_key(queue, "active"), 0, id)
            .ignore()
            .zrem(state_key(queue, "lease"), id)
            .ignore()
            .hset(task_key(queue, id), "state", TaskState::Completed.as_str())
            .ignore()
            .hset(task_key(queue, id), "completed_at", now.to_rfc3339())
            .ignore();
        if let Some(result) = result {
            pipe.hset(task_key(queue, id), "result", result).ignore();
        }
        pipe.zadd(state_key(queue, "completed"), id, now.timestamp())
            .ignore()
            .expire(task_key(queue, id), retention as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(queue, task_id = %id, "task completed");
        Ok(())
    }

    /// Report a failed attempt and schedule the next one.
    ///
    /// When `charge` is set the retry counter is incremented first and the
    /// task is archived once the budget is exhausted. Admission rejections
    /// pass `charge = false` and leave the counter untouched.
    pub async fn retry_later(
        &self,
        queue: &str,
        id: &str,
        err: &str,
        charge: bool,
    ) -> QueueResult<FailOutcome> {
        let mut conn = self.conn().await?;

        let fields: HashMap<String, String> = conn.hgetall(task_key(queue, id)).await?;
        if fields.is_empty() {
            return Err(QueueError::TaskNotFound(id.to_string()));
        }
        let max_retry: u32 = fields
            .get("max_retry")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let retried: u32 = if charge {
            let n: i64 = conn.hincr(task_key(queue, id), "retried", 1).await?;
            n.max(0) as u32
        } else {
            fields.get("retried").and_then(|s| s.parse().ok()).unwrap_or(0)
        };

        let _: () = conn
            .hset(task_key(queue, id), "last_error", err)
            .await?;

        if charge && retried > max_retry {
            self.archive_inner(&mut conn, queue, id).await?;
            warn!(queue, task_id = %id, retried, "retry budget exhausted, archiving");
            return Ok(FailOutcome::Archived);
        }

        let delay = backoff_delay(retried);
        let next = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();

        redis::pipe()
            .atomic()
            .lrem(state_key(queue, "active"), 0, id)
            .ignore()
            .zrem(state_key(queue, "lease"), id)
            .ignore()
            .hset(task_key(queue, id), "state", TaskState::Retry.as_str())
            .ignore()
            .hset(task_key(queue, id), "next_process_at", next.to_rfc3339())
            .ignore()
            .zadd(state_key(queue, "retry"), id, next.timestamp())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(
            queue,
            task_id = %id,
            retried,
            charge,
            delay_secs = delay.as_secs(),
            "task scheduled for retry"
        );
        Ok(FailOutcome::Retrying)
    }

    /// Report a failed attempt, charging one retry unit.
    pub async fn fail(&self, queue: &str, id: &str, err: &str) -> QueueResult<FailOutcome> {
        self.retry_later(queue, id, err, true).await
    }

    /// Archive a task immediately, bypassing the retry budget.
    /// Used for unrecoverable failures such as undecodable payloads.
    pub async fn archive(&self, queue: &str, id: &str, err: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(task_key(queue, id)).await?;
        if !exists {
            return Err(QueueError::TaskNotFound(id.to_string()));
        }
        let _: () = conn.hset(task_key(queue, id), "last_error", err).await?;
        self.archive_inner(&mut conn, queue, id).await?;
        Ok(())
    }

    async fn archive_inner(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
        id: &str,
    ) -> QueueResult<()> {
        let retention = self.retention_secs(conn, queue, id).await?;
        let now = Utc::now();

        redis::pipe()
            .atomic()
            .lrem(state_key(queue, "active"), 0, id)
            .ignore()
            .zrem(state_key(queue, "lease"), id)
            .ignore()
            .zrem(state_key(queue, "retry"), id)
            .ignore()
            .hset(task_key(queue, id), "state", TaskState::Archived.as_str())
            .ignore()
            .zadd(state_key(queue, "archived"), id, now.timestamp())
            .ignore()
            .expire(task_key(queue, id), retention as i64)
            .ignore()
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }

    /// Reclaim tasks whose lease deadline has passed (crashed or wedged
    /// consumers). Each reclaimed task is charged one retry unit.
    pub async fn claim_stale(&self, queue: &str) -> QueueResult<usize> {
        let mut conn = self.conn().await?;

        let now = Utc::now().timestamp();
        let ids: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(state_key(queue, "lease"))
            .arg(0)
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(PROMOTE_BATCH)
            .query_async(&mut conn)
            .await?;

        let mut reclaimed = 0;
        for id in ids {
            // Guard against racing another reclaimer.
            let removed: i64 = conn.zrem(state_key(queue, "lease"), &id).await?;
            if removed == 0 {
                continue;
            }
            let _: () = conn.lrem(state_key(queue, "active"), 0, &id).await?;
            match self
                .retry_later(queue, &id, "lease expired: task reclaimed", true)
                .await
            {
                Ok(_) => reclaimed += 1,
                Err(QueueError::TaskNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if reclaimed > 0 {
            warn!(queue, reclaimed, "reclaimed stale leases");
        }
        Ok(reclaimed)
    }

    /// Fetch a single task record.
    pub async fn task_info(&self, queue: &str, id: &str) -> QueueResult<TaskInfo> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(task_key(queue, id)).await?;
        if fields.is_empty() {
            return Err(QueueError::TaskNotFound(id.to_string()));
        }
        TaskInfo::from_hash(id, fields)
    }

    /// List up to `page_size` tasks in the given state, oldest first.
    /// Entries whose hash has expired are pruned as they are encountered.
    pub async fn list(
        &self,
        queue: &str,
        state: TaskState,
        page_size: usize,
    ) -> QueueResult<Vec<TaskInfo>> {
        let mut conn = self.conn().await?;
        let end = page_size as isize - 1;

        let ids: Vec<String> = match state {
            TaskState::Pending => conn.lrange(state_key(queue, "pending"), 0, end).await?,
            TaskState::Active => conn.lrange(state_key(queue, "active"), 0, end).await?,
            TaskState::Retry => conn.zrange(state_key(queue, "retry"), 0, end).await?,
            TaskState::Completed => conn.zrange(state_key(queue, "completed"), 0, end).await?,
            TaskState::Archived => conn.zrange(state_key(queue, "archived"), 0, end).await?,
        };

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            let fields: HashMap<String, String> = conn.hgetall(task_key(queue, &id)).await?;
            if fields.is_empty() {
                self.prune(&mut conn, queue, state, &id).await?;
                continue;
            }
            match TaskInfo::from_hash(&id, fields) {
                Ok(info) => tasks.push(info),
                Err(e) => warn!(queue, task_id = %id, "skipping malformed task: {e}"),
            }
        }
        Ok(tasks)
    }

    /// Number of tasks waiting in the pending list.
    pub async fn queue_len(&self, queue: &str) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.llen(state_key(queue, "pending")).await?)
    }

    /// Move due retry tasks back to pending.
    async fn promote_due(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
    ) -> QueueResult<()> {
        let now = Utc::now().timestamp();
        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(state_key(queue, "retry"))
            .arg(0)
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(PROMOTE_BATCH)
            .query_async(conn)
            .await?;

        for id in due {
            let removed: i64 = conn.zrem(state_key(queue, "retry"), &id).await?;
            if removed == 0 {
                continue;
            }
            redis::pipe()
                .atomic()
                .hset(task_key(queue, &id), "state", TaskState::Pending.as_str())
                .ignore()
                .rpush(state_key(queue, "pending"), &id)
                .ignore()
                .query_async::<()>(conn)
                .await?;
            debug!(queue, task_id = %id, "promoted retry task");
        }
        Ok(())
    }

    async fn retention_secs(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
        id: &str,
    ) -> QueueResult<u64> {
        let raw: Option<String> = conn.hget(task_key(queue, id), "retention_secs").await?;
        match raw {
            Some(s) => Ok(s
                .parse()
                .unwrap_or(EnqueueOpts::default().retention.as_secs())),
            None => Err(QueueError::TaskNotFound(id.to_string())),
        }
    }

    async fn prune(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
        state: TaskState,
        id: &str,
    ) -> QueueResult<()> {
        match state {
            TaskState::Pending => {
                let _: () = conn.lrem(state_key(queue, "pending"), 0, id).await?;
            }
            TaskState::Active => {
                let _: () = conn.lrem(state_key(queue, "active"), 0, id).await?;
            }
            TaskState::Retry => {
                let _: () = conn.zrem(state_key(queue, "retry"), id).await?;
            }
            TaskState::Completed => {
                let _: () = conn.zrem(state_key(queue, "completed"), id).await?;
            }
            TaskState::Archived => {
                let _: () = conn.zrem(state_key(queue, "archived"), id).await?;
            }
        }
        Ok(())
    }
}

fn task_key(queue: &str, id: &str) -> String {
    format!("ffq:{queue}:t:{id}")
}

fn state_key(queue: &str, suffix: &str) -> String {
    format!("ffq:{queue}:{suffix}")
}
