//! API configuration.

use std::time::Duration;

/// Intake server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP bind port.
    pub port: u16,
    /// Retry budget applied at enqueue time.
    pub task_max_retry: u32,
    /// Per-task wall-clock timeout.
    pub task_timeout: Duration,
    /// Result retention after the terminal state.
    pub task_retention: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            task_max_retry: 2,
            task_timeout: Duration::from_secs(30 * 60),
            task_retention: Duration::from_secs(24 * 3600),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            task_max_retry: std::env::var("TASK_MAX_RETRY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            task_timeout: Duration::from_secs(
                std::env::var("TASK_TIMEOUT_MINUTES")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(30)
                    * 60,
            ),
            task_retention: Duration::from_secs(
                std::env::var("TASK_RETENTION_HOURS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(24)
                    * 3600,
            ),
        }
    }
}
