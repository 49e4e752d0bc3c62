//! Durable task queues on Redis.
//!
//! This crate is the only coordination point between the three ffq services.
//! Each named queue keeps per-task hashes plus pending/active lists and
//! retry/completed/archived sorted sets, giving tasks: an immutable payload,
//! a monotonic retry counter, a last-error string, an append-once result
//! slot, and a retention window after the terminal state.

pub mod error;
pub mod queue;
pub mod task;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, TaskQueue};
pub use task::{EnqueueOpts, FailOutcome, LeasedTask, TaskInfo, TaskState};

/// Queue consumed by the processor.
pub const FFMPEG_QUEUE: &str = "ffmpeg";
/// Queue consumed by the notifier.
pub const WEBHOOKS_QUEUE: &str = "webhooks";
