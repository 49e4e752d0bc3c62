//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Admission rejection. Retried by the broker without charging the
    /// retry budget.
    #[error("resource limit: {0}")]
    ResourceLimit(String),

    /// Payload cannot be decoded; archived without retry.
    #[error("unmarshal payload: {0}")]
    MalformedPayload(String),

    #[error("download {0}")]
    Download(String),

    #[error("{0}")]
    Execution(String),

    #[error("output {0}")]
    OutputMissing(String),

    #[error("upload output {0}")]
    Upload(String),

    #[error("{0}")]
    Cancelled(String),

    #[error("Queue error: {0}")]
    Queue(#[from] ffq_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn cancelled() -> Self {
        Self::Cancelled("command cancelled".to_string())
    }

    /// Admission rejections are retried without consuming the budget.
    pub fn is_resource(&self) -> bool {
        matches!(self, WorkerError::ResourceLimit(_))
    }

    /// Unrecoverable failures skip the retry budget entirely.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, WorkerError::MalformedPayload(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_errors_carry_the_admission_tag() {
        let err = WorkerError::ResourceLimit("memory usage too high: 91.2%".to_string());
        assert!(err.is_resource());
        assert_eq!(err.to_string(), "resource limit: memory usage too high: 91.2%");
    }

    #[test]
    fn download_errors_name_the_input_key() {
        let err = WorkerError::Download("in_1: status 500".to_string());
        assert!(err.to_string().contains("download in_1"));
        assert!(!err.is_resource());
        assert!(!err.is_unrecoverable());
    }

    #[test]
    fn malformed_payload_is_unrecoverable() {
        let err = WorkerError::MalformedPayload("expected value at line 1".to_string());
        assert!(err.is_unrecoverable());
    }
}
