//! ffprobe probes for duration and dimensions.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Duration of a media file in milliseconds.
pub async fn media_duration_ms(path: &Path) -> MediaResult<i64> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed(format!(
            "duration probe failed for {}",
            path.display()
        )));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| MediaError::FfprobeFailed(format!("unparseable duration {raw:?}")))?;

    Ok((seconds * 1000.0) as i64)
}

/// Width and height of the first video stream. None when probing fails,
/// which callers treat as "dimensions unknown".
pub async fn media_dimensions(path: &Path) -> Option<(u32, u32)> {
    which::which("ffprobe").ok()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        debug!("dimension probe failed for {}", path.display());
        return None;
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
}

fn parse_dimensions(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.trim().split('x');
    let width: u32 = parts.next()?.parse().ok()?;
    let height: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_width_by_height() {
        assert_eq!(parse_dimensions("1920x1080\n"), Some((1920, 1080)));
        assert_eq!(parse_dimensions("640x480"), Some((640, 480)));
    }

    #[test]
    fn rejects_malformed_output() {
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("1920"), None);
        assert_eq!(parse_dimensions("1920x1080x3"), None);
        assert_eq!(parse_dimensions("WxH"), None);
    }
}
