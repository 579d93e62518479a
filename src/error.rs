//! Error types for the notion2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExportError`]: **Fatal**: the export cannot proceed at all
//!   (missing token, page not found, block list unreachable, output file
//!   not writable). Returned as `Err(ExportError)` from the top-level
//!   `export*` functions.
//!
//! * [`RelocationError`]: **Non-fatal**: a single image could not be
//!   downloaded or uploaded. The relocator logs it, reports it to the
//!   progress callback and falls back to the original image URL; it never
//!   reaches the caller of `export*`.
//!
//! Property and block decoding problems are not errors at all: they become
//! [`crate::model::Property::Unrecognized`] and
//! [`crate::model::Block::Unrecognized`] values and are annotated in place.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the notion2md library.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Document service errors ──────────────────────────────────────────
    /// No API token was configured.
    #[error("Notion API token is not set.\nProvide it with --token or NOTION_TOKEN.")]
    MissingToken,

    /// The page (or its block list) does not exist or is not shared with the integration.
    #[error("Page '{page_id}' not found.\nCheck the id and that the page is shared with your integration.")]
    PageNotFound { page_id: String },

    /// The service rejected the token (401/403).
    #[error("Notion API rejected the token: {detail}")]
    Unauthorized { detail: String },

    /// Any other non-2xx response from the document service.
    #[error("Notion API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Connection-level failure talking to the document service.
    #[error("Request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    /// A document service request exceeded the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s\nIncrease --api-timeout.")]
    Timeout { url: String, secs: u64 },

    /// The response body was not the JSON shape we expect.
    #[error("Invalid response from '{url}': {detail}")]
    InvalidResponse { url: String, detail: String },

    // ── Object store errors ──────────────────────────────────────────────
    /// The object-store client could not be constructed from configuration.
    #[error("Object store setup failed: {0}")]
    Store(String),

    // ── I/O errors ───────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error relocating a single image.
///
/// Never propagated past [`crate::pipeline::relocate::ImageRelocator`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RelocationError {
    /// Connection-level download failure.
    #[error("download of '{url}' failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("download of '{url}' timed out after {secs}s")]
    DownloadTimeout { url: String, secs: u64 },

    /// The image host answered with a non-2xx status.
    #[error("download of '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The local staging file could not be created, written or read.
    #[error("staging file error: {detail}")]
    Staging { detail: String },

    /// The object store refused or failed the upload.
    #[error("upload of '{key}' failed: {reason}")]
    UploadFailed { key: String, reason: String },
}

impl RelocationError {
    pub(crate) fn staging(e: std::io::Error) -> Self {
        RelocationError::Staging {
            detail: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_not_found_display() {
        let e = ExportError::PageNotFound {
            page_id: "abc123".into(),
        };
        assert!(e.to_string().contains("abc123"));
    }

    #[test]
    fn api_error_display() {
        let e = ExportError::Api {
            status: 502,
            message: "bad gateway".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("502"), "got: {msg}");
        assert!(msg.contains("bad gateway"));
    }

    #[test]
    fn timeout_display() {
        let e = ExportError::Timeout {
            url: "https://api.notion.com/v1/pages/x".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn http_status_display() {
        let e = RelocationError::HttpStatus {
            url: "https://x/y.png".into(),
            status: 404,
        };
        assert!(e.to_string().contains("404"));
        assert!(e.to_string().contains("https://x/y.png"));
    }

    #[test]
    fn staging_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let e = RelocationError::staging(io);
        assert!(e.to_string().contains("disk full"));
    }
}
