//! Image relocation: move an embedded image to object storage and rewrite its URL.
//!
//! ## Steps
//!
//! ```text
//! source URL ──▶ MD5(url) ──▶ download ──▶ staging file ──▶ upload ──▶ public URL
//!                  │                          │
//!                  └─ object key              └─ removed on every exit path
//! ```
//!
//! The content hash is taken over the URL string, not the image bytes, so a
//! given URL always maps to the same object key. Any failure along the way
//! degrades to the original URL: a broken image link in the export is
//! preferable to a failed export.
//!
//! Staging files are [`tempfile::NamedTempFile`]s, so they are deleted when
//! dropped, including on early returns and panics.

use crate::config::StoreConfig;
use crate::error::{ExportError, RelocationError};
use crate::model::ImageReference;
use crate::pipeline::store::{content_type_for, ObjectStore};
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extension used when the URL path has none.
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Fetches image bytes.
#[async_trait]
pub trait ImageDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<Bytes, RelocationError>;
}

/// [`ImageDownloader`] over plain HTTP(S) with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpDownloader {
    pub fn new(timeout_secs: u64) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExportError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl ImageDownloader for HttpDownloader {
    async fn download(&self, url: &str) -> Result<Bytes, RelocationError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                RelocationError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                RelocationError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(RelocationError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                RelocationError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                RelocationError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }
}

/// Hex-encoded MD5 of the URL string (32 lowercase hex chars).
pub fn content_hash(url: &str) -> String {
    hex::encode(Md5::digest(url.as_bytes()))
}

/// File extension (with leading dot) of the URL's path, query and fragment
/// ignored. Falls back to [`DEFAULT_EXTENSION`].
pub fn extension_for(url: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    Path::new(last_segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// What happened to one image.
#[derive(Debug, Clone)]
pub enum Relocation {
    /// Downloaded and uploaded in this call.
    Uploaded(ImageReference),
    /// Already relocated earlier in this run; no network work done.
    Reused(ImageReference),
    /// Relocation failed; the original URL is kept.
    Fallback {
        source_url: String,
        error: RelocationError,
    },
}

impl Relocation {
    /// The URL to put in the document.
    pub fn url(&self) -> &str {
        match self {
            Relocation::Uploaded(r) | Relocation::Reused(r) => &r.public_url,
            Relocation::Fallback { source_url, .. } => source_url,
        }
    }
}

/// Relocates images for one export run.
///
/// Holds only read-only configuration plus the optional per-run cache of
/// `content hash → public URL`.
pub struct ImageRelocator {
    store: Arc<dyn ObjectStore>,
    downloader: Arc<dyn ImageDownloader>,
    store_config: StoreConfig,
    staging_dir: PathBuf,
    cache: Option<Mutex<HashMap<String, String>>>,
    progress: Option<ProgressCallback>,
}

impl ImageRelocator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        downloader: Arc<dyn ImageDownloader>,
        store_config: StoreConfig,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            downloader,
            store_config,
            staging_dir: staging_dir.into(),
            cache: Some(Mutex::new(HashMap::new())),
            progress: None,
        }
    }

    /// Enable or disable the per-run cache. Enabled by default.
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Hash, key and public URL for `source_url`. Pure; touches nothing.
    pub fn reference_for(&self, source_url: &str) -> ImageReference {
        let content_hash = content_hash(source_url);
        let object_key = self
            .store_config
            .object_key(&content_hash, &extension_for(source_url));
        let public_url = self.store_config.public_url(&object_key);
        ImageReference {
            source_url: source_url.to_string(),
            content_hash,
            object_key,
            public_url,
        }
    }

    /// Relocate one image and return the URL to embed. Never fails.
    pub async fn relocate(&self, source_url: &str) -> String {
        self.relocate_detailed(source_url).await.url().to_string()
    }

    /// Like [`relocate`](Self::relocate) but reports what happened.
    pub async fn relocate_detailed(&self, source_url: &str) -> Relocation {
        let reference = self.reference_for(source_url);

        if let Some(public_url) = self.cached(&reference.content_hash) {
            debug!("Reusing {} for {}", public_url, source_url);
            self.report_relocated(source_url, &public_url);
            return Relocation::Reused(ImageReference {
                public_url,
                ..reference
            });
        }

        match self.transfer(&reference).await {
            Ok(()) => {
                info!("Relocated {} → {}", source_url, reference.public_url);
                if let Some(ref cache) = self.cache {
                    if let Ok(mut map) = cache.lock() {
                        map.insert(reference.content_hash.clone(), reference.public_url.clone());
                    }
                }
                self.report_relocated(source_url, &reference.public_url);
                Relocation::Uploaded(reference)
            }
            Err(error) => {
                warn!("Keeping original image URL {}: {}", source_url, error);
                if let Some(ref cb) = self.progress {
                    cb.on_image_fallback(source_url, &error.to_string());
                }
                Relocation::Fallback {
                    source_url: source_url.to_string(),
                    error,
                }
            }
        }
    }

    fn cached(&self, content_hash: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        let map = cache.lock().ok()?;
        map.get(content_hash).cloned()
    }

    fn report_relocated(&self, source_url: &str, public_url: &str) {
        if let Some(ref cb) = self.progress {
            cb.on_image_relocated(source_url, public_url);
        }
    }

    /// Download → stage → upload → remove staging file.
    async fn transfer(&self, reference: &ImageReference) -> Result<(), RelocationError> {
        let extension = extension_for(&reference.source_url);

        // Dropping `staging` deletes the file, so every `?` below cleans up.
        let staging = tempfile::Builder::new()
            .prefix(&format!("tmp_{}", reference.content_hash))
            .suffix(&extension)
            .tempfile_in(&self.staging_dir)
            .map_err(RelocationError::staging)?;

        let bytes = self.downloader.download(&reference.source_url).await?;
        debug!(
            "Downloaded {} ({} bytes) to {}",
            reference.source_url,
            bytes.len(),
            staging.path().display()
        );

        tokio::fs::write(staging.path(), &bytes)
            .await
            .map_err(RelocationError::staging)?;
        let staged = tokio::fs::read(staging.path())
            .await
            .map_err(RelocationError::staging)?;

        self.store
            .put_object(
                &reference.object_key,
                Bytes::from(staged),
                content_type_for(&extension),
            )
            .await?;

        let staging_path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            warn!(
                "Could not remove staging file {}: {}",
                staging_path.display(),
                e
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubDownloader {
        result: Result<Bytes, RelocationError>,
        calls: AtomicUsize,
    }

    impl StubDownloader {
        fn ok(body: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(Bytes::from_static(body)),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                result: Err(RelocationError::HttpStatus {
                    url: "stub".into(),
                    status,
                }),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageDownloader for StubDownloader {
        async fn download(&self, _url: &str) -> Result<Bytes, RelocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct RecordingStore {
        fail: bool,
        puts: Mutex<Vec<(String, Bytes, String)>>,
        staging_dir: PathBuf,
        staged_files_seen: AtomicUsize,
    }

    impl RecordingStore {
        fn new(fail: bool, staging_dir: &Path) -> Arc<Self> {
            Arc::new(Self {
                fail,
                puts: Mutex::new(Vec::new()),
                staging_dir: staging_dir.to_path_buf(),
                staged_files_seen: AtomicUsize::new(0),
            })
        }

        fn put_count(&self) -> usize {
            self.puts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(
            &self,
            key: &str,
            body: Bytes,
            content_type: &str,
        ) -> Result<(), RelocationError> {
            let staged = std::fs::read_dir(&self.staging_dir).unwrap().count();
            self.staged_files_seen.store(staged, Ordering::SeqCst);
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), body, content_type.to_string()));
            if self.fail {
                return Err(RelocationError::UploadFailed {
                    key: key.to_string(),
                    reason: "access denied".into(),
                });
            }
            Ok(())
        }
    }

    fn store_config() -> StoreConfig {
        StoreConfig::new("https://acc.r2.cloudflarestorage.com", "blog")
            .key_prefix("img")
            .custom_domain("https://cdn.example.com")
    }

    fn staging_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[test]
    fn hash_is_32_hex_chars_and_deterministic() {
        let a = content_hash("https://x/y/pic.png?a=1");
        let b = content_hash("https://x/y/pic.png?a=1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, content_hash("https://x/y/pic.png?a=2"));
    }

    #[test]
    fn known_md5_vector() {
        assert_eq!(content_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn extension_strips_query() {
        assert_eq!(extension_for("https://x/y/pic.png?a=1"), ".png");
        assert_eq!(extension_for("https://x/y/photo.JPEG#frag"), ".JPEG");
        assert_eq!(
            extension_for("https://s3.us-west-2.amazonaws.com/secure/abc/Untitled.gif?X-Amz-Expires=3600"),
            ".gif"
        );
    }

    #[test]
    fn extension_defaults_to_jpg() {
        assert_eq!(extension_for("https://images.unsplash.com/photo-123?w=800"), ".jpg");
        assert_eq!(extension_for("https://x/dir.v2/file"), ".jpg");
        assert_eq!(extension_for("https://x/"), ".jpg");
        assert_eq!(extension_for("not a url"), ".jpg");
    }

    #[test]
    fn reference_uses_prefix_and_custom_domain() {
        let dir = TempDir::new().unwrap();
        let relocator = ImageRelocator::new(
            RecordingStore::new(false, dir.path()),
            StubDownloader::ok(b"png"),
            store_config(),
            dir.path(),
        );
        let r = relocator.reference_for("https://x/y/pic.png?a=1");
        let hash = content_hash("https://x/y/pic.png?a=1");
        assert_eq!(r.object_key, format!("img/{hash}.png"));
        assert_eq!(r.public_url, format!("https://cdn.example.com/img/{hash}.png"));
        assert_eq!(r, relocator.reference_for("https://x/y/pic.png?a=1"));
    }

    #[tokio::test]
    async fn success_uploads_and_cleans_staging() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(false, dir.path());
        let downloader = StubDownloader::ok(b"\x89PNG");
        let relocator =
            ImageRelocator::new(store.clone(), downloader.clone(), store_config(), dir.path());

        let url = "https://x/y/pic.png?a=1";
        let out = relocator.relocate(url).await;

        let hash = content_hash(url);
        assert_eq!(out, format!("https://cdn.example.com/img/{hash}.png"));
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, format!("img/{hash}.png"));
        assert_eq!(puts[0].1, Bytes::from_static(b"\x89PNG"));
        assert_eq!(puts[0].2, "image/png");
        // The staged file existed while uploading, and is gone afterwards.
        assert_eq!(store.staged_files_seen.load(Ordering::SeqCst), 1);
        assert!(staging_is_empty(&dir));
    }

    #[tokio::test]
    async fn upload_failure_returns_original_and_cleans_staging() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(true, dir.path());
        let relocator = ImageRelocator::new(
            store.clone(),
            StubDownloader::ok(b"data"),
            store_config(),
            dir.path(),
        );

        let url = "https://x/y/pic.png?a=1";
        let outcome = relocator.relocate_detailed(url).await;
        assert_eq!(outcome.url(), url);
        assert!(matches!(
            outcome,
            Relocation::Fallback {
                error: RelocationError::UploadFailed { .. },
                ..
            }
        ));
        assert_eq!(store.put_count(), 1);
        assert!(staging_is_empty(&dir));
    }

    #[tokio::test]
    async fn download_failure_never_uploads() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(false, dir.path());
        let downloader = StubDownloader::failing(404);
        let relocator =
            ImageRelocator::new(store.clone(), downloader.clone(), store_config(), dir.path());

        let url = "https://x/missing.png";
        assert_eq!(relocator.relocate(url).await, url);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.put_count(), 0);
        assert!(staging_is_empty(&dir));
    }

    #[tokio::test]
    async fn missing_staging_dir_falls_back() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(false, dir.path());
        let downloader = StubDownloader::ok(b"data");
        let relocator = ImageRelocator::new(
            store.clone(),
            downloader.clone(),
            store_config(),
            dir.path().join("does-not-exist"),
        );

        let url = "https://x/a.png";
        let outcome = relocator.relocate_detailed(url).await;
        assert_eq!(outcome.url(), url);
        assert!(matches!(
            outcome,
            Relocation::Fallback {
                error: RelocationError::Staging { .. },
                ..
            }
        ));
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn repeated_url_is_reused_when_dedupe_enabled() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(false, dir.path());
        let downloader = StubDownloader::ok(b"data");
        let relocator =
            ImageRelocator::new(store.clone(), downloader.clone(), store_config(), dir.path());

        let url = "https://x/a.png";
        let first = relocator.relocate_detailed(url).await;
        let second = relocator.relocate_detailed(url).await;

        assert!(matches!(first, Relocation::Uploaded(_)));
        assert!(matches!(second, Relocation::Reused(_)));
        assert_eq!(first.url(), second.url());
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn repeated_url_reuploads_when_dedupe_disabled() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(false, dir.path());
        let relocator = ImageRelocator::new(
            store.clone(),
            StubDownloader::ok(b"data"),
            store_config(),
            dir.path(),
        )
        .with_dedupe(false);

        let url = "https://x/a.png";
        let first = relocator.relocate(url).await;
        let second = relocator.relocate(url).await;

        assert_eq!(first, second);
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].0, puts[1].0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(false, dir.path());
        let downloader = StubDownloader::failing(503);
        let relocator =
            ImageRelocator::new(store.clone(), downloader.clone(), store_config(), dir.path());

        relocator.relocate("https://x/a.png").await;
        relocator.relocate("https://x/a.png").await;
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 2);
    }
}
