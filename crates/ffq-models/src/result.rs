//! The result the worker records for a completed command.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::file_kind::FileKind;

/// Per-output metadata recorded after upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFileInfo {
    /// Derived as `<command_id>_<logical_key>`.
    pub file_id: String,
    /// File size in megabytes (bytes / 1048576).
    pub size_mbytes: f64,
    pub file_type: FileKind,
    /// Lowercased extension without the leading dot.
    pub file_format: String,
    /// Returned verbatim by the storage adapter.
    pub storage_url: String,
    /// Present only for video/image outputs; omitted when probing fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Written once into the task's result slot on the successful attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Keyed by the same logical keys as the request's `output_files`.
    pub output_files: BTreeMap<String, OutputFileInfo>,
    /// Wall time spent inside the external tool, summed across chained commands.
    pub ffmpeg_command_run_seconds: f64,
    /// Wall time from task pickup to result write.
    pub total_processing_seconds: f64,
    pub completed_at: DateTime<Utc>,
    /// Capability tag selected at startup (`none`, `nvenc`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_acceleration: Option<String>,
}
