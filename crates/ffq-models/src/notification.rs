//! The envelope the worker enqueues for webhook delivery.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{CommandRequest, CommandResult};

/// A queued webhook delivery.
///
/// `body` is the exact JSON object POSTed to the user's endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub url: String,
    pub command_id: String,
    pub status: String,
    pub body: Value,
}

impl NotificationEnvelope {
    /// Build the success envelope for a completed command.
    pub fn success(
        url: impl Into<String>,
        command_id: impl Into<String>,
        result: &CommandResult,
        request: &CommandRequest,
    ) -> Self {
        let command_id = command_id.into();
        let body = json!({
            "command_id": command_id,
            "status": "SUCCESS",
            "output_files": result.output_files,
            "original_request": request,
            "ffmpeg_command_run_seconds": result.ffmpeg_command_run_seconds,
            "total_processing_seconds": result.total_processing_seconds,
            "hardware_acceleration": result.hardware_acceleration,
        });
        Self {
            url: url.into(),
            command_id,
            status: "SUCCESS".to_string(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    #[test]
    fn body_mirrors_result_and_request() {
        let request = CommandRequest {
            output_files: BTreeMap::from([("out_1".to_string(), "a.jpg".to_string())]),
            ffmpeg_command: Some("-i {{in_1}} {{out_1}}".to_string()),
            webhook: Some("https://example.com/hook".to_string()),
            ..Default::default()
        };
        let result = CommandResult {
            output_files: BTreeMap::new(),
            ffmpeg_command_run_seconds: 1.0,
            total_processing_seconds: 2.0,
            completed_at: Utc::now(),
            hardware_acceleration: Some("none".to_string()),
        };

        let env = NotificationEnvelope::success("https://example.com/hook", "c1", &result, &request);
        assert_eq!(env.status, "SUCCESS");
        assert_eq!(env.body["command_id"], "c1");
        assert_eq!(env.body["status"], "SUCCESS");
        assert_eq!(env.body["total_processing_seconds"], 2.0);
        assert_eq!(
            env.body["original_request"]["ffmpeg_command"],
            "-i {{in_1}} {{out_1}}"
        );
    }
}
