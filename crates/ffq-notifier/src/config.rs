//! Notifier configuration.

use std::time::Duration;

/// Notifier configuration.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Concurrent delivery slots. Higher than the processor's default
    /// because delivery is I/O-bound.
    pub concurrency: usize,
    /// Process-wide timeout applied to every delivery POST.
    pub http_timeout: Duration,
    /// Port for the standalone health endpoint.
    pub health_port: u16,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            http_timeout: Duration::from_secs(10),
            health_port: 8081,
        }
    }
}

impl NotifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            concurrency: std::env::var("CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            http_timeout: Duration::from_secs(
                std::env::var("HTTP_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            health_port: std::env::var("HEALTH_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8081),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = NotifierConfig::default();
        assert_eq!(cfg.concurrency, 10);
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.health_port, 8081);
    }
}
