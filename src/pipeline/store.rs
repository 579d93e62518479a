//! Object storage: where relocated images end up.
//!
//! [`ObjectStore`] is the seam between the relocator and the network. The
//! production implementation, [`S3Store`], speaks the S3 protocol through an
//! `opendal` operator, which covers AWS S3, Cloudflare R2, MinIO and friends
//! with the same configuration shape. Tests substitute an in-memory store.

use crate::config::StoreConfig;
use crate::error::{ExportError, RelocationError};
use async_trait::async_trait;
use bytes::Bytes;
use opendal::layers::TimeoutLayer;
use opendal::services::S3;
use opendal::Operator;
use std::time::Duration;
use tracing::debug;

/// Durable key/value blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, overwriting any existing object.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), RelocationError>;
}

/// S3-compatible store backed by an `opendal` operator.
#[derive(Debug, Clone)]
pub struct S3Store {
    operator: Operator,
    bucket: String,
}

impl S3Store {
    /// Build the operator from configuration. No network traffic happens here.
    pub fn new(config: &StoreConfig, upload_timeout_secs: u64) -> Result<Self, ExportError> {
        let builder = S3::default()
            .root("/")
            .bucket(&config.bucket)
            .endpoint(&config.endpoint)
            .region(&config.region)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key);

        let operator = Operator::new(builder)
            .map_err(|e| ExportError::Store(e.to_string()))?
            .layer(TimeoutLayer::new().with_timeout(Duration::from_secs(upload_timeout_secs)))
            .finish();

        Ok(Self {
            operator,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), RelocationError> {
        debug!(
            "S3Store::put_object: {}/{} ({} bytes, {})",
            self.bucket,
            key,
            body.len(),
            content_type
        );

        self.operator
            .write_with(key, body)
            .content_type(content_type)
            .await
            .map(|_| ())
            .map_err(|e| RelocationError::UploadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Guess a MIME type from an extension such as `.png`.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension
        .trim_start_matches('.')
        .to_ascii_lowercase()
        .as_str()
    {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(".png"), "image/png");
        assert_eq!(content_type_for(".JPG"), "image/jpeg");
        assert_eq!(content_type_for("jpeg"), "image/jpeg");
        assert_eq!(content_type_for(".svg"), "image/svg+xml");
        assert_eq!(content_type_for(".bin"), "application/octet-stream");
        assert_eq!(content_type_for(""), "application/octet-stream");
    }

    #[test]
    fn s3_store_builds_without_network() {
        let config = StoreConfig::new("https://acc.r2.cloudflarestorage.com", "blog")
            .credentials("key", "secret");
        let store = S3Store::new(&config, 30).expect("operator should build");
        assert_eq!(store.bucket, "blog");
    }
}
