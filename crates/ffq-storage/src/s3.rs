//! S3-compatible object store adapter.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::info;

use crate::adapter::{prefixed_path, OutputAdapter};
use crate::content_type;
use crate::error::{StorageError, StorageResult};

/// PutObject uploads to S3 or any S3-compatible endpoint.
pub struct S3Adapter {
    client: Client,
    bucket: String,
    path_prefix: String,
    public_url: String,
    region: String,
    endpoint: String,
}

impl S3Adapter {
    pub async fn from_env() -> StorageResult<Self> {
        let bucket = std::env::var("S3_BUCKET")
            .map_err(|_| StorageError::config_error("S3_BUCKET is required"))?;
        let access_key = std::env::var("S3_ACCESS_KEY")
            .map_err(|_| StorageError::config_error("S3_ACCESS_KEY is required"))?;
        let secret_key = std::env::var("S3_SECRET_KEY")
            .map_err(|_| StorageError::config_error("S3_SECRET_KEY is required"))?;

        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let endpoint = std::env::var("S3_ENDPOINT").unwrap_or_default();
        let path_prefix = std::env::var("S3_PATH_PREFIX").unwrap_or_default();
        let public_url = std::env::var("S3_PUBLIC_URL").unwrap_or_default();

        let credentials = Credentials::new(&access_key, &secret_key, None, None, "ffq");

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials);
        if !endpoint.is_empty() {
            // Path-style addressing is required by most S3-compatible services.
            builder = builder.endpoint_url(&endpoint).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket,
            path_prefix,
            public_url,
            region,
            endpoint,
        })
    }

    fn object_key(&self, dest_path: &str) -> String {
        prefixed_path(&self.path_prefix, dest_path)
    }

    fn object_url(&self, key: &str) -> String {
        if !self.public_url.is_empty() {
            return format!("{}/{}", self.public_url.trim_end_matches('/'), key);
        }
        if !self.endpoint.is_empty() {
            return format!(
                "{}/{}/{}",
                self.endpoint.trim_end_matches('/'),
                self.bucket,
                key
            );
        }
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }
}

#[async_trait]
impl OutputAdapter for S3Adapter {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn upload(&self, local_path: &Path, dest_path: &str) -> StorageResult<String> {
        let key = self.object_key(dest_path);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("open file: {e}")))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(content_type::from_path(local_path))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("upload to s3: {e}")))?;

        info!(
            "[s3] uploaded {} -> s3://{}/{}",
            local_path.display(),
            self.bucket,
            key
        );
        Ok(self.object_url(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_adapter(endpoint: &str, public_url: &str, prefix: &str) -> S3Adapter {
        let credentials = Credentials::new("key", "secret", None, None, "test");
        let conf = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .build();
        S3Adapter {
            client: Client::from_conf(conf),
            bucket: "media".to_string(),
            path_prefix: prefix.to_string(),
            public_url: public_url.to_string(),
            region: "us-east-1".to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    #[test]
    fn public_url_wins_over_endpoint() {
        let adapter = test_adapter("https://minio.local:9000", "https://cdn.example.com", "");
        assert_eq!(
            adapter.object_url("c1_a.mp4"),
            "https://cdn.example.com/c1_a.mp4"
        );
    }

    #[test]
    fn endpoint_url_used_when_no_public_url() {
        let adapter = test_adapter("https://minio.local:9000/", "", "");
        assert_eq!(
            adapter.object_url("c1_a.mp4"),
            "https://minio.local:9000/media/c1_a.mp4"
        );
    }

    #[test]
    fn aws_virtual_host_url_is_the_default() {
        let adapter = test_adapter("", "", "");
        assert_eq!(
            adapter.object_url("c1_a.mp4"),
            "https://media.s3.us-east-1.amazonaws.com/c1_a.mp4"
        );
    }

    #[test]
    fn object_key_applies_prefix() {
        let adapter = test_adapter("", "", "outputs/");
        assert_eq!(adapter.object_key("c1_a.mp4"), "outputs/c1_a.mp4");
    }
}
