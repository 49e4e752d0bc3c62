//! Bunny Stream adapter.

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::adapter::OutputAdapter;
use crate::error::{StorageError, StorageResult};

#[derive(Deserialize)]
struct CreateVideoResponse {
    guid: String,
}

/// Two-step Bunny Stream upload: create a video entry to obtain a GUID, then
/// PUT the file body. The GUID is the returned storage URL.
pub struct BunnyStreamAdapter {
    library_id: String,
    api_key: String,
    client: reqwest::Client,
}

impl BunnyStreamAdapter {
    pub fn from_env() -> StorageResult<Self> {
        let library_id = std::env::var("BUNNY_STREAM_LIBRARY_ID")
            .map_err(|_| StorageError::config_error("BUNNY_STREAM_LIBRARY_ID is required"))?;
        let api_key = std::env::var("BUNNY_STREAM_API_KEY")
            .map_err(|_| StorageError::config_error("BUNNY_STREAM_API_KEY is required"))?;

        Ok(Self {
            library_id,
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl OutputAdapter for BunnyStreamAdapter {
    fn name(&self) -> &'static str {
        "bunny-stream"
    }

    async fn upload(&self, local_path: &Path, dest_path: &str) -> StorageResult<String> {
        // Step 1: create the video entry.
        let create_url = format!(
            "https://video.bunnycdn.com/library/{}/videos",
            self.library_id
        );
        let resp = self
            .client
            .post(&create_url)
            .header("AccessKey", &self.api_key)
            .json(&serde_json::json!({ "title": dest_path }))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("create video: {e}")))?;

        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed(format!(
                "create video failed (status {}): {body}",
                status.as_u16()
            )));
        }

        let created: CreateVideoResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::upload_failed(format!("decode response: {e}")))?;
        if created.guid.is_empty() {
            return Err(StorageError::upload_failed(
                "no guid returned from video creation",
            ));
        }

        // Step 2: upload the file body.
        let upload_url = format!(
            "https://video.bunnycdn.com/library/{}/videos/{}",
            self.library_id, created.guid
        );
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("open file: {e}")))?;

        let resp = self
            .client
            .put(&upload_url)
            .header("AccessKey", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("upload: {e}")))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed(format!(
                "upload failed (status {}): {body}",
                status.as_u16()
            )));
        }

        info!("[bunny-stream] uploaded {} -> {}", local_path.display(), created.guid);
        Ok(created.guid)
    }
}
