//! Progress-callback trait for per-block and per-image export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as the pipeline converts each block and relocates each image.
//!
//! The trait is `Send + Sync` because image relocations for distinct blocks
//! may run concurrently; `on_block_converted` is still reported in document
//! order.
//!
//! # Example
//!
//! ```rust
//! use notion2md::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FallbackCounter {
//!     fallbacks: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for FallbackCounter {
//!     fn on_image_fallback(&self, source_url: &str, error: &str) {
//!         self.fallbacks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("kept {source_url}: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(FallbackCounter { fallbacks: AtomicUsize::new(0) });
//!
//! let config = ExportConfig::builder()
//!     .token("secret_xxx")
//!     .progress_callback(counter as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::model::ExportStats;
use std::sync::Arc;

/// Called by the export pipeline as it works through a page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once after the block list has been fetched.
    fn on_export_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called after each block's fragment is ready (1-indexed, document order).
    fn on_block_converted(&self, index: usize, total_blocks: usize) {
        let _ = (index, total_blocks);
    }

    /// Called when an image was uploaded (or reused) and its URL rewritten.
    fn on_image_relocated(&self, source_url: &str, public_url: &str) {
        let _ = (source_url, public_url);
    }

    /// Called when an image relocation failed and the original URL was kept.
    fn on_image_fallback(&self, source_url: &str, error: &str) {
        let _ = (source_url, error);
    }

    /// Called once after the document has been assembled.
    fn on_export_complete(&self, stats: &ExportStats) {
        let _ = stats;
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Document, TextRun};
    use crate::pipeline::assemble::render_document;
    use crate::pipeline::blocks::BlockConverter;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        converted: Mutex<Vec<(usize, usize)>>,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_block_converted(&self, index: usize, total_blocks: usize) {
            self.converted.lock().unwrap().push((index, total_blocks));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(3);
        cb.on_block_converted(1, 3);
        cb.on_image_relocated("a", "b");
        cb.on_image_fallback("a", "boom");
        cb.on_export_complete(&ExportStats::default());
    }

    #[tokio::test]
    async fn block_events_are_one_indexed_and_ordered() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();
        let doc = Document {
            title: "T".into(),
            properties: vec![],
            blocks: vec![
                Block::Paragraph {
                    rich_text: vec![TextRun::new("a")],
                },
                Block::Divider,
                Block::Paragraph { rich_text: vec![] },
            ],
        };

        render_document(&doc, BlockConverter::new(None), 3, Some(&cb)).await;

        assert_eq!(
            *tracker.converted.lock().unwrap(),
            vec![(1, 3), (2, 3), (3, 3)]
        );
    }
}
