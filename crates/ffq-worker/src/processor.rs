//! The per-task processing pipeline.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use ffq_media::probe;
use ffq_media::{
    download_file, expand_placeholders, extension_from_url, tokenize, FfmpegRunner,
    HardwareCapabilities, MediaError,
};
use ffq_models::{
    CommandRequest, CommandResult, FileKind, NotificationEnvelope, OutputFileInfo, MBYTE,
};
use ffq_queue::{EnqueueOpts, LeasedTask, TaskQueue, WEBHOOKS_QUEUE};
use ffq_storage::OutputAdapter;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::resources::{self, ResourceLimits};
use crate::workspace::JobWorkspace;

/// Lease timeout applied to enqueued webhook deliveries.
const WEBHOOK_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// What a successful run produces: the recorded result plus the decoded
/// request (needed for the notification body).
pub struct ProcessOutcome {
    pub result: CommandResult,
    pub request: CommandRequest,
}

/// Executes a single leased command end to end.
pub struct CommandProcessor {
    config: WorkerConfig,
    storage: Arc<dyn OutputAdapter>,
    http: reqwest::Client,
    hardware: HardwareCapabilities,
}

impl CommandProcessor {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn OutputAdapter>,
        hardware: HardwareCapabilities,
    ) -> Self {
        Self {
            config,
            storage,
            http: reqwest::Client::new(),
            hardware,
        }
    }

    /// Run the full pipeline for one task.
    ///
    /// The workspace directory is removed on every exit path: the guard
    /// drops on success, on error, and when the caller's timeout drops this
    /// future mid-flight.
    pub async fn process(
        &self,
        task: &LeasedTask,
        cancel_rx: watch::Receiver<bool>,
    ) -> WorkerResult<ProcessOutcome> {
        // Admission gate: defer instead of failing when the host is saturated.
        if self.config.resource_check_enabled {
            let limits = ResourceLimits {
                max_memory_percent: self.config.max_memory_percent,
            };
            if let Err(reason) = resources::check_available(&limits) {
                info!(command_id = %task.id, "deferring task: {reason}");
                return Err(WorkerError::ResourceLimit(reason));
            }
        }

        let req: CommandRequest = serde_json::from_slice(&task.payload)
            .map_err(|e| WorkerError::MalformedPayload(e.to_string()))?;

        let command_id = task.id.as_str();
        let started = Instant::now();
        let workspace = JobWorkspace::create(&self.config.work_dir, command_id)?;

        info!(
            command_id,
            inputs = req.input_files.len(),
            outputs = req.output_files.len(),
            "starting command"
        );

        // Download inputs sequentially.
        let mut input_paths: BTreeMap<String, String> = BTreeMap::new();
        for (key, url) in &req.input_files {
            let ext = extension_from_url(url);
            let local = workspace.path().join(format!("{key}{ext}"));
            download_file(&self.http, url, &local, &cancel_rx)
                .await
                .map_err(|e| match e {
                    MediaError::Cancelled => WorkerError::cancelled(),
                    other => WorkerError::Download(format!("{key}: {other}")),
                })?;
            input_paths.insert(key.clone(), local.to_string_lossy().into_owned());
            info!(command_id, "downloaded {key}: {url}");
        }

        if *cancel_rx.borrow() {
            return Err(WorkerError::cancelled());
        }

        let mut output_paths: BTreeMap<String, String> = BTreeMap::new();
        for (key, filename) in &req.output_files {
            let local = workspace.path().join(filename);
            output_paths.insert(key.clone(), local.to_string_lossy().into_owned());
        }

        // Duration of the first probe-able input; failure only disables
        // progress reporting.
        let mut duration_ms: Option<i64> = None;
        for path in input_paths.values() {
            if let Ok(d) = probe::media_duration_ms(Path::new(path)).await {
                if d > 0 {
                    duration_ms = Some(d);
                    break;
                }
            }
        }

        let commands = req.commands();

        let mut paths = input_paths.clone();
        paths.extend(output_paths.clone());

        let ffmpeg_started = Instant::now();
        for (i, raw) in commands.iter().enumerate() {
            let expanded = expand_placeholders(raw, &paths);
            info!(
                command_id,
                "running command {}/{}: ffmpeg {expanded}",
                i + 1,
                commands.len()
            );

            let args = tokenize(&expanded);
            let progress_id = command_id.to_string();
            let runner = FfmpegRunner::new()
                .with_duration_ms(duration_ms)
                .with_cancel(cancel_rx.clone())
                .on_progress(Arc::new(move |p| {
                    if let Some(percent) = p.percent_done {
                        info!(
                            command_id = %progress_id,
                            "progress: {percent:.1}% (speed: {})",
                            p.speed
                        );
                    }
                }));

            if let Err(e) = runner.run(&args).await {
                if matches!(e, MediaError::Cancelled) || *cancel_rx.borrow() {
                    return Err(WorkerError::Cancelled(
                        "command cancelled during encoding".to_string(),
                    ));
                }
                let mut msg = format!("ffmpeg failed (command {}): {e}", i + 1);
                if let Some(stderr) = e.stderr() {
                    if !stderr.is_empty() {
                        msg.push('\n');
                        msg.push_str(stderr);
                    }
                }
                return Err(WorkerError::Execution(msg));
            }
        }
        let ffmpeg_seconds = ffmpeg_started.elapsed().as_secs_f64();

        if *cancel_rx.borrow() {
            return Err(WorkerError::cancelled());
        }

        // Collect and upload outputs; only after the last command succeeded.
        let mut output_files = BTreeMap::new();
        for (key, filename) in &req.output_files {
            let local = Path::new(&output_paths[key]);
            let meta = tokio::fs::metadata(local)
                .await
                .map_err(|e| WorkerError::OutputMissing(format!("{key} not created: {e}")))?;

            let dest_path = format!("{command_id}_{filename}");
            let storage_url = self
                .storage
                .upload(local, &dest_path)
                .await
                .map_err(|e| WorkerError::Upload(format!("{key}: {e}")))?;

            let ext = filename
                .rsplit_once('.')
                .map(|(_, e)| e)
                .unwrap_or("")
                .to_ascii_lowercase();
            let file_type = FileKind::from_extension(&ext);

            let (width, height) = if file_type.has_dimensions() {
                probe::media_dimensions(local)
                    .await
                    .map_or((None, None), |(w, h)| (Some(w), Some(h)))
            } else {
                (None, None)
            };

            let file_info = OutputFileInfo {
                file_id: format!("{command_id}_{key}"),
                size_mbytes: meta.len() as f64 / MBYTE,
                file_type,
                file_format: ext,
                storage_url: storage_url.clone(),
                width,
                height,
            };
            info!(
                command_id,
                "output {key}: {storage_url} ({:.2} MB)", file_info.size_mbytes
            );
            output_files.insert(key.clone(), file_info);
        }

        let total_seconds = started.elapsed().as_secs_f64();
        let result = CommandResult {
            output_files,
            ffmpeg_command_run_seconds: ffmpeg_seconds,
            total_processing_seconds: total_seconds,
            completed_at: Utc::now(),
            hardware_acceleration: Some(self.hardware.accel.as_str().to_string()),
        };

        info!(
            command_id,
            "completed in {total_seconds:.2}s (ffmpeg: {ffmpeg_seconds:.2}s, hw: {})",
            self.hardware.accel.as_str()
        );

        Ok(ProcessOutcome {
            result,
            request: req,
        })
    }

    /// Enqueue the webhook notification for a completed command.
    /// Called after the result write; failures are logged and swallowed.
    pub async fn enqueue_notification(
        &self,
        queue: &TaskQueue,
        command_id: &str,
        outcome: &ProcessOutcome,
    ) {
        let Some(url) = outcome.request.webhook.as_deref() else {
            return;
        };

        let envelope =
            NotificationEnvelope::success(url, command_id, &outcome.result, &outcome.request);
        let payload = match serde_json::to_vec(&envelope) {
            Ok(p) => p,
            Err(e) => {
                warn!(command_id, "failed to serialize webhook payload: {e}");
                return;
            }
        };

        let opts = EnqueueOpts {
            max_retry: self.config.webhook_max_retry,
            timeout: WEBHOOK_TASK_TIMEOUT,
            retention: self.config.webhook_retention,
        };
        match queue.enqueue(WEBHOOKS_QUEUE, &payload, opts).await {
            Ok(id) => info!(command_id, "webhook enqueued: {id}"),
            Err(e) => warn!(command_id, "failed to enqueue webhook: {e}"),
        }
    }
}
