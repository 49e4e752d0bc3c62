//! Bunny Edge Storage adapter.

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::info;

use crate::adapter::{prefixed_path, OutputAdapter};
use crate::content_type;
use crate::error::{StorageError, StorageResult};

/// HTTP PUT uploads to a Bunny storage zone.
///
/// Returns `PULL_ZONE_URL/<path>` when a pull zone is configured and the
/// bare storage path otherwise.
pub struct BunnyStorageAdapter {
    storage_zone: String,
    storage_key: String,
    storage_endpoint: String,
    path_prefix: String,
    pull_zone_url: String,
    client: reqwest::Client,
}

impl BunnyStorageAdapter {
    pub fn from_env() -> StorageResult<Self> {
        let storage_zone = std::env::var("BUNNY_STORAGE_ZONE")
            .map_err(|_| StorageError::config_error("BUNNY_STORAGE_ZONE is required"))?;
        let storage_key = std::env::var("BUNNY_STORAGE_KEY")
            .map_err(|_| StorageError::config_error("BUNNY_STORAGE_KEY is required"))?;

        Ok(Self {
            storage_zone,
            storage_key,
            storage_endpoint: std::env::var("BUNNY_STORAGE_ENDPOINT")
                .unwrap_or_else(|_| "storage.bunnycdn.com".to_string()),
            path_prefix: std::env::var("BUNNY_STORAGE_PATH_PREFIX").unwrap_or_default(),
            pull_zone_url: std::env::var("BUNNY_STORAGE_PULL_ZONE_URL").unwrap_or_default(),
            client: reqwest::Client::new(),
        })
    }

    fn storage_path(&self, dest_path: &str) -> String {
        prefixed_path(&self.path_prefix, dest_path)
    }
}

#[async_trait]
impl OutputAdapter for BunnyStorageAdapter {
    fn name(&self) -> &'static str {
        "bunny-storage"
    }

    async fn upload(&self, local_path: &Path, dest_path: &str) -> StorageResult<String> {
        let storage_path = self.storage_path(dest_path);
        let url = format!(
            "https://{}/{}/{}",
            self.storage_endpoint, self.storage_zone, storage_path
        );

        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("open file: {e}")))?;

        let resp = self
            .client
            .put(&url)
            .header("AccessKey", &self.storage_key)
            .header("Content-Type", content_type::from_path(local_path))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("upload failed: {e}")))?;

        let status = resp.status();
        if status != StatusCode::CREATED && status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed(format!(
                "upload failed (status {}): {body}",
                status.as_u16()
            )));
        }

        info!("[bunny-storage] uploaded {} -> {}", local_path.display(), storage_path);

        if self.pull_zone_url.is_empty() {
            Ok(storage_path)
        } else {
            Ok(format!(
                "{}/{}",
                self.pull_zone_url.trim_end_matches('/'),
                storage_path
            ))
        }
    }
}
