//! FFmpeg runner with progress tracking and cancellation.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Called with a snapshot on every `progress=continue|end` line.
pub type ProgressCallback = Arc<dyn Fn(FfmpegProgress) + Send + Sync>;

/// Current progress of an FFmpeg run, parsed from `-progress pipe:1` output.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    pub frame: i64,
    pub fps: f64,
    /// e.g. "1234.5kbits/s"
    pub bitrate: String,
    /// Output size in bytes so far.
    pub total_size: i64,
    /// Output time in microseconds.
    pub out_time_us: i64,
    /// e.g. "2.5x"
    pub speed: String,
    /// "continue" or "end".
    pub progress: String,
    /// Estimated completion, 0-100. None without input duration.
    pub percent_done: Option<f64>,
}

/// Runs ffmpeg with forced overwrite, optional progress reporting, and a
/// cancellation signal wired to child termination.
pub struct FfmpegRunner {
    duration_ms: Option<i64>,
    cancel_rx: Option<watch::Receiver<bool>>,
    on_progress: Option<ProgressCallback>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            duration_ms: None,
            cancel_rx: None,
            on_progress: None,
        }
    }

    /// Input duration in milliseconds; enables `-progress pipe:1` and
    /// percent estimation.
    pub fn with_duration_ms(mut self, duration_ms: Option<i64>) -> Self {
        self.duration_ms = duration_ms.filter(|d| *d > 0);
        self
    }

    /// Cancellation signal. When it fires mid-run the child is killed and
    /// `MediaError::Cancelled` is returned.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Run ffmpeg with the given argv. `-y` is always prepended; when the
    /// input duration is known `-progress pipe:1` is prepended as well.
    pub async fn run(&self, args: &[String]) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        if let Some(cancel_rx) = &self.cancel_rx {
            if *cancel_rx.borrow() {
                return Err(MediaError::Cancelled);
            }
        }

        let mut full_args: Vec<String> = vec!["-y".to_string()];
        if self.duration_ms.is_some() {
            full_args.push("-progress".to_string());
            full_args.push("pipe:1".to_string());
        }
        full_args.extend_from_slice(args);

        debug!("running: ffmpeg {}", full_args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        let duration_ms = self.duration_ms;
        let callback = self.on_progress.clone();
        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut current = FfmpegProgress::default();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(snapshot) = parse_progress_line(&line, &mut current, duration_ms) {
                    if let Some(cb) = &callback {
                        cb(snapshot);
                    }
                }
            }
        });

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut stderr = stderr;
            stderr.read_to_end(&mut buf).await.ok();
            buf
        });

        let status = if let Some(cancel_rx) = &self.cancel_rx {
            let mut cancel_rx = cancel_rx.clone();
            let status = tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel_rx.changed() => None,
            };
            match status {
                Some(status) => status?,
                None => {
                    child.kill().await.ok();
                    progress_task.abort();
                    return Err(MediaError::Cancelled);
                }
            }
        } else {
            child.wait().await?
        };

        progress_task.await.ok();
        let stderr_buf = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "ffmpeg exited with non-zero status",
                Some(String::from_utf8_lossy(&stderr_buf).into_owned()),
                status.code(),
            ))
        }
    }
}

/// Parse one key=value line from ffmpeg's progress output. Returns a
/// snapshot when the line closes a progress block (`progress=...`).
fn parse_progress_line(
    line: &str,
    current: &mut FfmpegProgress,
    duration_ms: Option<i64>,
) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;
    let (key, value) = (key.trim(), value.trim());

    match key {
        "frame" => current.frame = value.parse().unwrap_or(current.frame),
        "fps" => current.fps = value.parse().unwrap_or(current.fps),
        "bitrate" => current.bitrate = value.to_string(),
        "total_size" => current.total_size = value.parse().unwrap_or(current.total_size),
        "out_time_us" => current.out_time_us = value.parse().unwrap_or(current.out_time_us),
        "speed" => current.speed = value.to_string(),
        "progress" => {
            current.progress = value.to_string();
            current.percent_done = match duration_ms {
                Some(d) if d > 0 && current.out_time_us > 0 => {
                    Some(((current.out_time_us / 1000) as f64 / d as f64 * 100.0).min(100.0))
                }
                _ => None,
            };
            return Some(current.clone());
        }
        _ => {}
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_fields_until_progress_line() {
        let mut current = FfmpegProgress::default();
        assert!(parse_progress_line("frame=120", &mut current, Some(10_000)).is_none());
        assert!(parse_progress_line("fps=29.97", &mut current, Some(10_000)).is_none());
        assert!(parse_progress_line("out_time_us=5000000", &mut current, Some(10_000)).is_none());
        assert!(parse_progress_line("speed=2.5x", &mut current, Some(10_000)).is_none());

        let snapshot = parse_progress_line("progress=continue", &mut current, Some(10_000)).unwrap();
        assert_eq!(snapshot.frame, 120);
        assert_eq!(snapshot.speed, "2.5x");
        assert_eq!(snapshot.progress, "continue");
        // 5,000,000 us = 5,000 ms of 10,000 ms -> 50%
        assert!((snapshot.percent_done.unwrap() - 50.0).abs() < 0.001);
    }

    #[test]
    fn percent_clamps_at_one_hundred() {
        let mut current = FfmpegProgress::default();
        parse_progress_line("out_time_us=20000000", &mut current, Some(10_000));
        let snapshot = parse_progress_line("progress=end", &mut current, Some(10_000)).unwrap();
        assert_eq!(snapshot.percent_done, Some(100.0));
        assert_eq!(snapshot.progress, "end");
    }

    #[test]
    fn no_percent_without_duration() {
        let mut current = FfmpegProgress::default();
        parse_progress_line("out_time_us=1000000", &mut current, None);
        let snapshot = parse_progress_line("progress=continue", &mut current, None).unwrap();
        assert_eq!(snapshot.percent_done, None);
    }

    #[test]
    fn lines_without_equals_are_ignored() {
        let mut current = FfmpegProgress::default();
        assert!(parse_progress_line("banner text", &mut current, Some(1000)).is_none());
        assert!(parse_progress_line("", &mut current, Some(1000)).is_none());
        assert_eq!(current.frame, 0);
    }
}
