//! The declarative command submitted by clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A media-processing command.
///
/// `input_files` maps logical keys (e.g. `in_1`) to fetchable URLs;
/// `output_files` maps logical keys to destination file names. The command
/// line(s) reference both through `{{key}}` placeholders. Exactly one of
/// `ffmpeg_command` / `ffmpeg_commands` must be supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Logical key -> source URL. May be empty.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_files: BTreeMap<String, String>,
    /// Logical key -> destination file name (plain file name, no directories).
    #[serde(default)]
    pub output_files: BTreeMap<String, String>,
    /// Single command line to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_command: Option<String>,
    /// Ordered command lines run sequentially in the same working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_commands: Option<Vec<String>>,
    /// Absolute HTTP(S) URL notified on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    /// Opaque client string, echoed back verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

impl CommandRequest {
    /// The command lines to execute, in order.
    ///
    /// `ffmpeg_commands` wins when present; otherwise the single command is
    /// returned as a singleton. Validation guarantees one of the two is set.
    pub fn commands(&self) -> Vec<String> {
        if let Some(cmds) = &self.ffmpeg_commands {
            if !cmds.is_empty() {
                return cmds.clone();
            }
        }
        self.ffmpeg_command
            .as_ref()
            .map(|c| vec![c.clone()])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_prefers_chained_list() {
        let req = CommandRequest {
            ffmpeg_command: Some("-i a b".to_string()),
            ffmpeg_commands: Some(vec!["-i x y".to_string(), "-i y z".to_string()]),
            ..Default::default()
        };
        assert_eq!(req.commands().len(), 2);
    }

    #[test]
    fn commands_falls_back_to_single() {
        let req = CommandRequest {
            ffmpeg_command: Some("-i a b".to_string()),
            ..Default::default()
        };
        assert_eq!(req.commands(), vec!["-i a b".to_string()]);
    }

    #[test]
    fn round_trips_through_json() {
        let json = r#"{
            "input_files": {"in_1": "https://example.com/v.mp4"},
            "output_files": {"out_1": "thumb.jpg"},
            "ffmpeg_command": "-i {{in_1}} -vframes 1 {{out_1}}",
            "reference_id": "order-42"
        }"#;
        let req: CommandRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.input_files["in_1"], "https://example.com/v.mp4");
        assert_eq!(req.reference_id.as_deref(), Some("order-42"));

        let back = serde_json::to_value(&req).unwrap();
        assert!(back.get("ffmpeg_commands").is_none());
        assert!(back.get("webhook").is_none());
    }
}
