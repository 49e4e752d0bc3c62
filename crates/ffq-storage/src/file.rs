//! Local filesystem adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::adapter::OutputAdapter;
use crate::error::{StorageError, StorageResult};

/// Copies outputs into `OUTPUT_DIR`, returning `STORAGE_BASE_URL/<dest>` when
/// a base URL is configured and the absolute local path otherwise.
pub struct FileAdapter {
    output_dir: PathBuf,
    storage_base_url: String,
}

impl FileAdapter {
    pub fn from_env() -> StorageResult<Self> {
        let output_dir =
            PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "/tmp/ffmpeg-output".to_string()));
        std::fs::create_dir_all(&output_dir)?;

        Ok(Self {
            output_dir,
            storage_base_url: std::env::var("STORAGE_BASE_URL").unwrap_or_default(),
        })
    }

    pub fn new(output_dir: impl Into<PathBuf>, storage_base_url: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            storage_base_url: storage_base_url.into(),
        }
    }
}

#[async_trait]
impl OutputAdapter for FileAdapter {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn upload(&self, local_path: &Path, dest_path: &str) -> StorageResult<String> {
        let final_path = self.output_dir.join(dest_path);

        if let Some(dir) = final_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::upload_failed(format!("create directory: {e}")))?;
        }

        tokio::fs::copy(local_path, &final_path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("copy: {e}")))?;

        info!(
            "[file] saved {} -> {}",
            local_path.display(),
            final_path.display()
        );

        if self.storage_base_url.is_empty() {
            Ok(final_path.to_string_lossy().into_owned())
        } else {
            Ok(format!(
                "{}/{}",
                self.storage_base_url.trim_end_matches('/'),
                dest_path
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_and_returns_local_path_without_base_url() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("clip.mp4");
        tokio::fs::write(&src, b"data").await.unwrap();

        let adapter = FileAdapter::new(out_dir.path(), "");
        let url = adapter.upload(&src, "cmd1_clip.mp4").await.unwrap();

        assert_eq!(url, out_dir.path().join("cmd1_clip.mp4").to_string_lossy());
        let copied = tokio::fs::read(out_dir.path().join("cmd1_clip.mp4"))
            .await
            .unwrap();
        assert_eq!(copied, b"data");
    }

    #[tokio::test]
    async fn returns_base_url_when_configured() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("t.jpg");
        tokio::fs::write(&src, b"jpg").await.unwrap();

        let adapter = FileAdapter::new(out_dir.path(), "https://cdn.example.com/");
        let url = adapter.upload(&src, "cmd2_t.jpg").await.unwrap();
        assert_eq!(url, "https://cdn.example.com/cmd2_t.jpg");
    }

    #[tokio::test]
    async fn creates_intermediate_directories() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("a.bin");
        tokio::fs::write(&src, b"x").await.unwrap();

        let adapter = FileAdapter::new(out_dir.path(), "");
        adapter.upload(&src, "nested/deep/a.bin").await.unwrap();
        assert!(out_dir.path().join("nested/deep/a.bin").exists());
    }

    #[tokio::test]
    async fn missing_source_is_an_upload_error() {
        let out_dir = tempfile::tempdir().unwrap();
        let adapter = FileAdapter::new(out_dir.path(), "");
        let err = adapter
            .upload(Path::new("/nonexistent/file.mp4"), "x.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
    }
}
