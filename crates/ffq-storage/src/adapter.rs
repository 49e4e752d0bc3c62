//! The output adapter contract and its startup-time factory.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bunny_storage::BunnyStorageAdapter;
use crate::bunny_stream::BunnyStreamAdapter;
use crate::error::{StorageError, StorageResult};
use crate::file::FileAdapter;
use crate::s3::S3Adapter;

/// Destination for processed output files.
///
/// Adapters perform no internal retry; any error is reported to the caller
/// as a fatal task failure.
#[async_trait]
pub trait OutputAdapter: Send + Sync {
    /// Adapter variant tag, for logging.
    fn name(&self) -> &'static str;

    /// Upload a local file under `dest_path` and return the storage URL.
    async fn upload(&self, local_path: &Path, dest_path: &str) -> StorageResult<String>;
}

/// Build the adapter selected by `STORAGE_ADAPTER` (default `file`).
pub async fn new_adapter() -> StorageResult<Arc<dyn OutputAdapter>> {
    let kind = std::env::var("STORAGE_ADAPTER").unwrap_or_else(|_| "file".to_string());

    match kind.as_str() {
        "file" => Ok(Arc::new(FileAdapter::from_env()?)),
        "bunny-storage" => Ok(Arc::new(BunnyStorageAdapter::from_env()?)),
        "bunny-stream" => Ok(Arc::new(BunnyStreamAdapter::from_env()?)),
        "s3" => Ok(Arc::new(S3Adapter::from_env().await?)),
        other => Err(StorageError::config_error(format!(
            "unknown storage adapter: {other}"
        ))),
    }
}

/// Join an optional prefix and a destination path with a single slash.
pub(crate) fn prefixed_path(prefix: &str, dest_path: &str) -> String {
    if prefix.is_empty() {
        dest_path.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), dest_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_joining() {
        assert_eq!(prefixed_path("", "a.mp4"), "a.mp4");
        assert_eq!(prefixed_path("clips", "a.mp4"), "clips/a.mp4");
        assert_eq!(prefixed_path("clips/", "a.mp4"), "clips/a.mp4");
    }
}
