//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent task slots.
    pub concurrency: usize,
    /// Root for per-task working directories.
    pub work_dir: PathBuf,
    /// Whether the admission gate is active.
    pub resource_check_enabled: bool,
    /// Admission threshold for memory utilization.
    pub max_memory_percent: f64,
    /// Retry budget applied when enqueueing webhook deliveries.
    pub webhook_max_retry: u32,
    /// Retention for webhook tasks, including dead-lettered ones.
    pub webhook_retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            work_dir: PathBuf::from("/tmp/ffmpeg-jobs"),
            resource_check_enabled: true,
            max_memory_percent: 85.0,
            webhook_max_retry: 5,
            webhook_retention: Duration::from_secs(72 * 3600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            concurrency: std::env::var("CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/ffmpeg-jobs")),
            resource_check_enabled: std::env::var("RESOURCE_CHECK_ENABLED")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(true),
            max_memory_percent: std::env::var("MAX_MEMORY_PERCENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(85.0),
            webhook_max_retry: std::env::var("WEBHOOK_MAX_RETRY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            webhook_retention: Duration::from_secs(
                std::env::var("WEBHOOK_RETENTION_HOURS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(72)
                    * 3600,
            ),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/ffmpeg-jobs"));
        assert!(cfg.resource_check_enabled);
        assert_eq!(cfg.max_memory_percent, 85.0);
        assert_eq!(cfg.webhook_max_retry, 5);
        assert_eq!(cfg.webhook_retention, Duration::from_secs(72 * 3600));
    }
}
