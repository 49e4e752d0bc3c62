//! Task records and enqueue options.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{QueueError, QueueResult};

/// Broker-side task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the pending list.
    Pending,
    /// Leased by a consumer.
    Active,
    /// Failed, scheduled for another attempt.
    Retry,
    /// Terminal success; result slot written.
    Completed,
    /// Terminal failure; last error preserved until retention expires.
    Archived,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Active => "active",
            TaskState::Retry => "retry",
            TaskState::Completed => "completed",
            TaskState::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> QueueResult<Self> {
        match s {
            "pending" => Ok(TaskState::Pending),
            "active" => Ok(TaskState::Active),
            "retry" => Ok(TaskState::Retry),
            "completed" => Ok(TaskState::Completed),
            "archived" => Ok(TaskState::Archived),
            other => Err(QueueError::malformed(format!("unknown state {other:?}"))),
        }
    }
}

/// Options applied when a task is enqueued.
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOpts {
    /// Retry budget: how many failed attempts may be re-tried before the
    /// task is archived. `max_retry = 2` allows three attempts in total.
    pub max_retry: u32,
    /// Wall-clock lease for a single attempt.
    pub timeout: Duration,
    /// How long terminal tasks (and their results) are kept.
    pub retention: Duration,
}

impl Default for EnqueueOpts {
    fn default() -> Self {
        Self {
            max_retry: 2,
            timeout: Duration::from_secs(30 * 60),
            retention: Duration::from_secs(24 * 3600),
        }
    }
}

/// A task handed to a consumer by `dequeue`.
#[derive(Debug, Clone)]
pub struct LeasedTask {
    pub id: String,
    pub payload: Vec<u8>,
    /// Charged failures so far.
    pub retried: u32,
    /// Wall-clock budget for this attempt.
    pub timeout: Duration,
}

/// Outcome of a non-terminal failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Scheduled for another attempt.
    Retrying,
    /// Retry budget exhausted; task archived.
    Archived,
}

/// Full task record as stored in the per-task hash.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: String,
    pub state: TaskState,
    pub payload: Vec<u8>,
    pub retried: u32,
    pub max_retry: u32,
    pub last_error: Option<String>,
    pub result: Option<Vec<u8>>,
    pub enqueued_at: DateTime<Utc>,
    /// Next attempt time; equals `enqueued_at` until the first retry.
    pub next_process_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskInfo {
    /// Parse a task hash as returned by HGETALL.
    pub(crate) fn from_hash(id: &str, fields: HashMap<String, String>) -> QueueResult<Self> {
        let get = |key: &str| -> QueueResult<&String> {
            fields
                .get(key)
                .ok_or_else(|| QueueError::malformed(format!("task {id} missing field {key}")))
        };

        let parse_ts = |raw: &str| -> QueueResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| QueueError::malformed(format!("task {id} bad timestamp: {e}")))
        };

        let state = TaskState::parse(get("state")?)?;
        let enqueued_at = parse_ts(get("enqueued_at")?)?;
        let next_process_at = parse_ts(get("next_process_at")?)?;
        let completed_at = match fields.get("completed_at") {
            Some(raw) if !raw.is_empty() => Some(parse_ts(raw)?),
            _ => None,
        };

        Ok(Self {
            id: id.to_string(),
            state,
            payload: get("payload")?.clone().into_bytes(),
            retried: get("retried")?.parse().unwrap_or(0),
            max_retry: get("max_retry")?.parse().unwrap_or(0),
            last_error: fields.get("last_error").filter(|s| !s.is_empty()).cloned(),
            result: fields
                .get("result")
                .filter(|s| !s.is_empty())
                .map(|s| s.clone().into_bytes()),
            enqueued_at,
            next_process_at,
            completed_at,
        })
    }
}

/// Exponential backoff for charged retries, capped at fifteen minutes.
/// Non-charging retries keep `retried` at zero and land on the base delay.
pub(crate) fn backoff_delay(retried: u32) -> Duration {
    const BASE_SECS: u64 = 10;
    const CAP_SECS: u64 = 15 * 60;
    let exp = retried.min(16);
    Duration::from_secs((BASE_SECS << exp).min(CAP_SECS))
}
