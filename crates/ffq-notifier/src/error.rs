//! Notifier error types.

use thiserror::Error;

pub type NotifierResult<T> = Result<T, NotifierError>;

#[derive(Debug, Error)]
pub enum NotifierError {
    /// Envelope cannot be decoded; archived without retry.
    #[error("unmarshal payload: {0}")]
    MalformedPayload(String),

    #[error("http request failed: {0}")]
    Transport(String),

    #[error("webhook returned non-2xx status: {0}")]
    Status(u16),

    #[error("Queue error: {0}")]
    Queue(#[from] ffq_queue::QueueError),
}

impl NotifierError {
    /// Unrecoverable failures skip the retry budget entirely.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, NotifierError::MalformedPayload(_))
    }
}
