//! Command submission and status handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use ffq_models::{CommandRequest, CommandResult, OutputFileInfo};
use ffq_queue::{EnqueueOpts, QueueError, TaskInfo, TaskState, FFMPEG_QUEUE};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Rows fetched per broker state for the listing endpoint.
const LIST_PAGE_SIZE: usize = 100;

/// Upper bound on the opaque client reference.
const MAX_REFERENCE_ID_LEN: usize = 256;

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub command_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

/// Projection of one broker task into the status record clients read.
#[derive(Debug, Serialize)]
pub struct CommandStatus {
    pub command_id: String,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_files: Option<BTreeMap<String, OutputFileInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_command_run_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_processing_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_request: Option<CommandRequest>,
}

#[derive(Debug, Serialize)]
pub struct CommandListResponse {
    pub commands: Vec<CommandStatus>,
    pub total: usize,
}

/// POST /v1/commands
pub async fn create_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> ApiResult<Json<CommandResponse>> {
    validate(&req)?;

    let payload =
        serde_json::to_vec(&req).map_err(|e| ApiError::internal(format!("encode payload: {e}")))?;
    let opts = EnqueueOpts {
        max_retry: state.config.task_max_retry,
        timeout: state.config.task_timeout,
        retention: state.config.task_retention,
    };

    let command_id = state.queue.enqueue(FFMPEG_QUEUE, &payload, opts).await?;
    info!(command_id = %command_id, "command enqueued");

    Ok(Json(CommandResponse {
        command_id,
        status: "PENDING",
        reference_id: req.reference_id,
    }))
}

/// GET /v1/commands
///
/// Pages the first 100 tasks of each broker state. `total` is the number of
/// returned rows, not a global count.
pub async fn list_commands(State(state): State<AppState>) -> ApiResult<Json<CommandListResponse>> {
    let pages = [
        (TaskState::Active, "PROCESSING"),
        (TaskState::Pending, "PENDING"),
        (TaskState::Completed, "SUCCESS"),
        (TaskState::Archived, "FAILED"),
    ];

    let mut commands = Vec::new();
    for (task_state, status) in pages {
        let tasks = state
            .queue
            .list(FFMPEG_QUEUE, task_state, LIST_PAGE_SIZE)
            .await?;
        commands.extend(tasks.iter().map(|t| project(t, status)));
    }

    let total = commands.len();
    Ok(Json(CommandListResponse { commands, total }))
}

/// GET /v1/commands/:id
pub async fn get_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CommandStatus>> {
    let task = state
        .queue
        .task_info(FFMPEG_QUEUE, &id)
        .await
        .map_err(|e| match e {
            QueueError::TaskNotFound(_) => ApiError::not_found("command not found"),
            other => other.into(),
        })?;

    let status = status_for_state(task.state);
    Ok(Json(project(&task, status)))
}

/// Validate a submission. Every rejection is a single-line 400.
fn validate(req: &CommandRequest) -> Result<(), ApiError> {
    if req.output_files.is_empty() {
        return Err(ApiError::validation("output_files required"));
    }
    for filename in req.output_files.values() {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename == "."
            || filename == ".."
        {
            return Err(ApiError::validation(
                "output_files values must be plain file names",
            ));
        }
    }

    let has_single = req
        .ffmpeg_command
        .as_deref()
        .map(|c| !c.is_empty())
        .unwrap_or(false);
    match &req.ffmpeg_commands {
        Some(_) if has_single => {
            return Err(ApiError::validation(
                "only one of ffmpeg_command or ffmpeg_commands may be set",
            ));
        }
        Some(cmds) if cmds.is_empty() => {
            return Err(ApiError::validation("ffmpeg_commands must not be empty"));
        }
        None if !has_single => {
            return Err(ApiError::validation(
                "ffmpeg_command or ffmpeg_commands required",
            ));
        }
        _ => {}
    }

    if let Some(webhook) = &req.webhook {
        let ok = url::Url::parse(webhook)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !ok {
            return Err(ApiError::validation(
                "webhook must be an absolute http(s) URL",
            ));
        }
    }

    if let Some(reference_id) = &req.reference_id {
        if reference_id.len() > MAX_REFERENCE_ID_LEN {
            return Err(ApiError::validation("reference_id too long"));
        }
    }

    Ok(())
}

fn status_for_state(state: TaskState) -> &'static str {
    match state {
        TaskState::Pending => "PENDING",
        TaskState::Active => "PROCESSING",
        TaskState::Retry => "RETRYING",
        TaskState::Completed => "SUCCESS",
        TaskState::Archived => "FAILED",
    }
}

/// Project a broker task into a status record.
///
/// `created_at` is taken from the broker's next-process-at timestamp, which
/// is approximate for tasks past their first attempt.
fn project(task: &TaskInfo, status: &'static str) -> CommandStatus {
    let original_request: Option<CommandRequest> = serde_json::from_slice(&task.payload).ok();

    let mut record = CommandStatus {
        command_id: task.id.clone(),
        status,
        created_at: task.next_process_at,
        completed_at: None,
        output_files: None,
        ffmpeg_command_run_seconds: None,
        total_processing_seconds: None,
        error: task.last_error.clone(),
        original_request,
    };

    if let Some(result) = task
        .result
        .as_deref()
        .and_then(|raw| serde_json::from_slice::<CommandResult>(raw).ok())
    {
        record.completed_at = Some(result.completed_at);
        record.output_files = Some(result.output_files);
        record.ffmpeg_command_run_seconds = Some(result.ffmpeg_command_run_seconds);
        record.total_processing_seconds = Some(result.total_processing_seconds);
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> CommandRequest {
        CommandRequest {
            input_files: BTreeMap::from([(
                "in_1".to_string(),
                "https://example.com/v.mp4".to_string(),
            )]),
            output_files: BTreeMap::from([("out_1".to_string(), "t.jpg".to_string())]),
            ffmpeg_command: Some("-i {{in_1}} -ss 00:00:05 -vframes 1 {{out_1}}".to_string()),
            ..Default::default()
        }
    }

    fn message(err: ApiError) -> String {
        err.to_string()
    }

    #[test]
    fn missing_outputs_is_rejected() {
        let mut req = base_request();
        req.output_files.clear();
        assert_eq!(message(validate(&req).unwrap_err()), "output_files required");
    }

    #[test]
    fn missing_command_is_rejected() {
        let mut req = base_request();
        req.ffmpeg_command = None;
        assert_eq!(
            message(validate(&req).unwrap_err()),
            "ffmpeg_command or ffmpeg_commands required"
        );
    }

    #[test]
    fn empty_command_string_counts_as_missing() {
        let mut req = base_request();
        req.ffmpeg_command = Some(String::new());
        assert_eq!(
            message(validate(&req).unwrap_err()),
            "ffmpeg_command or ffmpeg_commands required"
        );
    }

    #[test]
    fn both_command_forms_are_rejected() {
        let mut req = base_request();
        req.ffmpeg_commands = Some(vec!["-i {{in_1}} {{out_1}}".to_string()]);
        assert_eq!(
            message(validate(&req).unwrap_err()),
            "only one of ffmpeg_command or ffmpeg_commands may be set"
        );
    }

    #[test]
    fn empty_command_list_is_rejected() {
        let mut req = base_request();
        req.ffmpeg_command = None;
        req.ffmpeg_commands = Some(Vec::new());
        assert_eq!(
            message(validate(&req).unwrap_err()),
            "ffmpeg_commands must not be empty"
        );
    }

    #[test]
    fn chained_commands_alone_are_accepted() {
        let mut req = base_request();
        req.ffmpeg_command = None;
        req.ffmpeg_commands = Some(vec![
            "-i {{in_1}} -ss 10 -vframes 1 {{out_1}}".to_string(),
            "-i {{in_1}} -vf fps=10 -t 5 {{out_1}}".to_string(),
        ]);
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn webhook_must_be_absolute_http() {
        let mut req = base_request();
        for bad in ["not-a-url", "/relative/path", "ftp://example.com/x"] {
            req.webhook = Some(bad.to_string());
            assert_eq!(
                message(validate(&req).unwrap_err()),
                "webhook must be an absolute http(s) URL",
                "webhook {bad:?} should be rejected"
            );
        }

        req.webhook = Some("https://example.com/hooks/ffq".to_string());
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn reference_id_length_is_bounded() {
        let mut req = base_request();
        req.reference_id = Some("r".repeat(MAX_REFERENCE_ID_LEN));
        assert!(validate(&req).is_ok());
        req.reference_id = Some("r".repeat(MAX_REFERENCE_ID_LEN + 1));
        assert_eq!(message(validate(&req).unwrap_err()), "reference_id too long");
    }

    #[test]
    fn output_names_may_not_traverse_directories() {
        let mut req = base_request();
        for bad in ["../escape.jpg", "dir/file.jpg", "", ".."] {
            req.output_files
                .insert("out_1".to_string(), bad.to_string());
            assert_eq!(
                message(validate(&req).unwrap_err()),
                "output_files values must be plain file names",
                "filename {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn state_projection() {
        assert_eq!(status_for_state(TaskState::Pending), "PENDING");
        assert_eq!(status_for_state(TaskState::Active), "PROCESSING");
        assert_eq!(status_for_state(TaskState::Retry), "RETRYING");
        assert_eq!(status_for_state(TaskState::Completed), "SUCCESS");
        assert_eq!(status_for_state(TaskState::Archived), "FAILED");
    }

    #[test]
    fn projection_carries_result_fields() {
        let request = base_request();
        let result = serde_json::json!({
            "output_files": {
                "out_1": {
                    "file_id": "task-1_out_1",
                    "size_mbytes": 0.5,
                    "file_type": "image",
                    "file_format": "jpg",
                    "storage_url": "https://cdn.example.com/task-1_t.jpg"
                }
            },
            "ffmpeg_command_run_seconds": 1.25,
            "total_processing_seconds": 3.5,
            "completed_at": "2025-06-01T12:05:00Z"
        });

        let task = TaskInfo {
            id: "task-1".to_string(),
            state: TaskState::Completed,
            payload: serde_json::to_vec(&request).unwrap(),
            retried: 0,
            max_retry: 2,
            last_error: None,
            result: Some(serde_json::to_vec(&result).unwrap()),
            enqueued_at: Utc::now(),
            next_process_at: Utc::now(),
            completed_at: None,
        };

        let record = project(&task, "SUCCESS");
        assert_eq!(record.status, "SUCCESS");
        assert_eq!(record.ffmpeg_command_run_seconds, Some(1.25));
        assert_eq!(record.total_processing_seconds, Some(3.5));
        let outputs = record.output_files.unwrap();
        assert_eq!(outputs["out_1"].file_id, "task-1_out_1");
        assert!(record.original_request.is_some());
        assert!(record.error.is_none());
    }

    #[test]
    fn projection_surfaces_the_last_error() {
        let task = TaskInfo {
            id: "task-2".to_string(),
            state: TaskState::Archived,
            payload: serde_json::to_vec(&base_request()).unwrap(),
            retried: 3,
            max_retry: 2,
            last_error: Some("download in_1: status 500".to_string()),
            result: None,
            enqueued_at: Utc::now(),
            next_process_at: Utc::now(),
            completed_at: None,
        };

        let record = project(&task, status_for_state(task.state));
        assert_eq!(record.status, "FAILED");
        assert_eq!(record.error.as_deref(), Some("download in_1: status 500"));
        assert!(record.output_files.is_none());
    }
}
