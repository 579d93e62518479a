//! Configuration types for a page export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. The config is constructed once at startup and
//! passed by reference to every stage; nothing in the crate reads global
//! state or environment variables on its own.

use crate::error::ExportError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Default Notion REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// Notion API version sent with every request.
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Configuration for a page export.
///
/// # Example
/// ```rust
/// use notion2md::{ExportConfig, StoreConfig};
///
/// let store = StoreConfig::new("https://acc.r2.cloudflarestorage.com", "blog")
///     .credentials("AKIA...", "secret")
///     .key_prefix("img")
///     .custom_domain("https://cdn.example.com");
///
/// let config = ExportConfig::builder()
///     .token("secret_xxx")
///     .store(store)
///     .image_concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Notion integration token.
    pub token: Option<String>,

    /// Base URL of the Notion REST API. Default: [`DEFAULT_API_BASE`].
    pub api_base: String,

    /// `Notion-Version` header value. Default: [`DEFAULT_NOTION_VERSION`].
    pub notion_version: String,

    /// Per-request timeout for document service calls in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Object store for image relocation. `None` keeps original image URLs.
    pub store: Option<StoreConfig>,

    /// Directory the Markdown file is written to. Default: `doc`.
    pub output_dir: PathBuf,

    /// Directory for image staging files. `None` uses the system temp dir.
    pub staging_dir: Option<PathBuf>,

    /// Maximum image relocations in flight at once. Default: 4.
    ///
    /// Output order never depends on this value.
    pub image_concurrency: usize,

    /// Per-image download timeout in seconds. Default: 10.
    pub download_timeout_secs: u64,

    /// Per-image upload timeout in seconds. Default: 60.
    pub upload_timeout_secs: u64,

    /// Reuse the public URL of an image already relocated in this run. Default: true.
    pub dedupe_images: bool,

    /// Fail the export when the page title/properties cannot be fetched. Default: false.
    ///
    /// When false the export continues with a placeholder title.
    pub require_metadata: bool,

    /// Optional per-block / per-image event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            api_timeout_secs: 30,
            store: None,
            output_dir: PathBuf::from("doc"),
            staging_dir: None,
            image_concurrency: 4,
            download_timeout_secs: 10,
            upload_timeout_secs: 60,
            dedupe_images: true,
            require_metadata: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("notion_version", &self.notion_version)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("store", &self.store)
            .field("output_dir", &self.output_dir)
            .field("staging_dir", &self.staging_dir)
            .field("image_concurrency", &self.image_concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("dedupe_images", &self.dedupe_images)
            .field("require_metadata", &self.require_metadata)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Staging directory for downloaded images.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn notion_version(mut self, version: impl Into<String>) -> Self {
        self.config.notion_version = version.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = Some(store);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn image_concurrency(mut self, n: usize) -> Self {
        self.config.image_concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn dedupe_images(mut self, v: bool) -> Self {
        self.config.dedupe_images = v;
        self
    }

    pub fn require_metadata(mut self, v: bool) -> Self {
        self.config.require_metadata = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        if c.image_concurrency == 0 {
            return Err(ExportError::InvalidConfig(
                "Image concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 || c.upload_timeout_secs == 0
        {
            return Err(ExportError::InvalidConfig(
                "Timeouts must be at least 1 second".into(),
            ));
        }
        if let Some(ref store) = c.store {
            if store.endpoint.trim().is_empty() {
                return Err(ExportError::InvalidConfig(
                    "Object store endpoint must not be empty".into(),
                ));
            }
            if store.bucket.trim().is_empty() {
                return Err(ExportError::InvalidConfig(
                    "Object store bucket must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Object store ─────────────────────────────────────────────────────────

/// Connection and addressing settings for the S3-compatible object store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// S3 endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: String,
    pub bucket: String,
    /// Signing region. Default: `auto` (what R2 expects).
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Prefix prepended to every object key. Default: `images`.
    pub key_prefix: String,
    /// Public base URL to use instead of `{endpoint}/{bucket}`.
    pub custom_domain: Option<String>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("key_prefix", &self.key_prefix)
            .field("custom_domain", &self.custom_domain)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            region: "auto".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            key_prefix: "images".to_string(),
            custom_domain: None,
        }
    }

    pub fn credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = access_key_id.into();
        self.secret_access_key = secret_access_key.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn custom_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.custom_domain = if domain.trim().is_empty() {
            None
        } else {
            Some(domain)
        };
        self
    }

    /// Object key for an image: `{prefix}/{hash}{extension}`.
    ///
    /// An empty prefix yields `{hash}{extension}`.
    pub fn object_key(&self, content_hash: &str, extension: &str) -> String {
        let prefix = self.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{content_hash}{extension}")
        } else {
            format!("{prefix}/{content_hash}{extension}")
        }
    }

    /// Base URL objects are publicly reachable under.
    pub fn public_base(&self) -> String {
        match self.custom_domain {
            Some(ref domain) => domain.trim_end_matches('/').to_string(),
            None => format!(
                "{}/{}",
                self.endpoint.trim_end_matches('/'),
                self.bucket.trim_matches('/')
            ),
        }
    }

    /// Public URL of `key`.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base(), key.trim_start_matches('/'))
    }
}
