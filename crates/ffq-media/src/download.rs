//! HTTP input download.

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// File extension for a downloaded input, derived from the URL path.
///
/// Falls back to `.mp4` when the path has no extension or the extension is
/// longer than five characters including the dot.
pub fn extension_from_url(raw_url: &str) -> String {
    let path = match url::Url::parse(raw_url) {
        Ok(u) => u.path().to_string(),
        Err(_) => raw_url.to_string(),
    };

    let ext = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.').map(|(_, e)| e))
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    if ext.is_empty() || ext.len() > 5 {
        ".mp4".to_string()
    } else {
        ext
    }
}

/// Stream a URL to a local file.
///
/// Any non-200 final status or transport error fails the download. The
/// cancellation signal aborts an in-flight transfer between chunks.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    cancel_rx: &watch::Receiver<bool>,
) -> MediaResult<()> {
    if *cancel_rx.borrow() {
        return Err(MediaError::Cancelled);
    }

    let mut resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::download_failed(e.to_string()))?;

    if resp.status().as_u16() != 200 {
        return Err(MediaError::download_failed(format!(
            "status {}",
            resp.status().as_u16()
        )));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut cancel_rx = cancel_rx.clone();
    let mut written: u64 = 0;

    loop {
        tokio::select! {
            chunk = resp.chunk() => {
                match chunk.map_err(|e| MediaError::download_failed(e.to_string()))? {
                    Some(bytes) => {
                        file.write_all(&bytes).await?;
                        written += bytes.len() as u64;
                    }
                    None => break,
                }
            }
            _ = cancel_rx.changed() => {
                return Err(MediaError::Cancelled);
            }
        }
    }

    file.flush().await?;
    debug!("downloaded {url} -> {} ({written} bytes)", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_comes_from_the_url_path() {
        assert_eq!(extension_from_url("https://example.com/videos/v.mp4"), ".mp4");
        assert_eq!(extension_from_url("https://example.com/a.webm"), ".webm");
        assert_eq!(extension_from_url("http://host/dir/clip.mov"), ".mov");
    }

    #[test]
    fn query_strings_do_not_leak_into_the_extension() {
        assert_eq!(
            extension_from_url("https://example.com/v.mp4?token=abc.def"),
            ".mp4"
        );
    }

    #[test]
    fn missing_extension_falls_back_to_mp4() {
        assert_eq!(extension_from_url("https://example.com/stream"), ".mp4");
        assert_eq!(extension_from_url("https://example.com/"), ".mp4");
    }

    #[test]
    fn overlong_extension_falls_back_to_mp4() {
        // ".webm" is five characters including the dot and is kept;
        // anything longer is rejected.
        assert_eq!(extension_from_url("https://example.com/a.matroska"), ".mp4");
        assert_eq!(extension_from_url("https://example.com/a.webm"), ".webm");
    }

    #[test]
    fn unparseable_urls_still_yield_an_extension() {
        assert_eq!(extension_from_url("not a url at all.gif"), ".gif");
        assert_eq!(extension_from_url("plain"), ".mp4");
    }
}
