//! Export entry points.
//!
//! [`export_page`] wires the production collaborators (Notion client, S3
//! store, HTTP downloader) from an [`ExportConfig`]; [`export_with`] takes
//! them as parameters so tests and embedders can substitute their own.

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::model::{Document, ExportOutput, ExportStats};
use crate::pipeline::assemble::render_document;
use crate::pipeline::blocks::BlockConverter;
use crate::pipeline::relocate::{HttpDownloader, ImageRelocator, Relocation};
use crate::pipeline::source::{normalize_page_id, DocumentSource, NotionClient, PageMeta};
use crate::pipeline::store::S3Store;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Export a page to Markdown.
///
/// `page_id` may be a bare id, a dashed UUID or a page URL.
///
/// # Errors
/// Returns `Err(ExportError)` only for fatal errors:
/// - no token configured / object store misconfigured
/// - block list unreachable (not found, unauthorised, transport failure)
/// - page metadata unreachable when `require_metadata` is set
///
/// Image and property problems never fail the export.
pub async fn export_page(
    page_id: impl AsRef<str>,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    let page_id = normalize_page_id(page_id.as_ref());
    let source = NotionClient::new(config)?;
    let relocator = build_relocator(config)?;
    export_with(&source, relocator.as_ref(), &page_id, config).await
}

/// Export a page using caller-supplied collaborators.
///
/// `relocator = None` keeps every image at its source URL.
pub async fn export_with(
    source: &dyn DocumentSource,
    relocator: Option<&ImageRelocator>,
    page_id: &str,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    let start = Instant::now();
    info!("Starting export: {}", page_id);

    // ── Step 1: Title and properties ─────────────────────────────────────
    let meta = match source.page_meta(page_id).await {
        Ok(meta) => meta,
        Err(e) if config.require_metadata => return Err(e),
        Err(e) => {
            warn!("Could not fetch page metadata, using placeholder title: {}", e);
            PageMeta::placeholder()
        }
    };

    // ── Step 2: Blocks ───────────────────────────────────────────────────
    let blocks = source.list_blocks(page_id).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(blocks.len());
    }

    let document = Document {
        title: meta.title,
        properties: meta.properties,
        blocks,
    };

    // ── Step 3: Convert and assemble ─────────────────────────────────────
    let rendered = render_document(
        &document,
        BlockConverter::new(relocator),
        config.image_concurrency,
        config.progress_callback.as_ref(),
    )
    .await;

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let mut stats = ExportStats {
        total_blocks: document.blocks.len(),
        ..ExportStats::default()
    };
    for fragment in &rendered.fragments {
        if fragment.is_blank() {
            stats.skipped_blocks += 1;
        } else {
            stats.emitted_blocks += 1;
        }
        match fragment.relocation {
            Some(Relocation::Uploaded(_)) => stats.images_relocated += 1,
            Some(Relocation::Reused(_)) => stats.images_reused += 1,
            Some(Relocation::Fallback { .. }) => stats.images_fallback += 1,
            None => {}
        }
    }
    stats.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Export complete: {}/{} blocks emitted, {} images relocated, {} reused, {} kept, {}ms",
        stats.emitted_blocks,
        stats.total_blocks,
        stats.images_relocated,
        stats.images_reused,
        stats.images_fallback,
        stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(&stats);
    }

    Ok(ExportOutput {
        page_id: page_id.to_string(),
        title: document.title,
        markdown: rendered.markdown,
        stats,
    })
}

/// Export a page and write it to `{output_dir}/{sanitised title}.md`.
///
/// Returns the written path alongside the export output.
pub async fn export_to_file(
    page_id: impl AsRef<str>,
    config: &ExportConfig,
) -> Result<(PathBuf, ExportOutput), ExportError> {
    let output = export_page(page_id, config).await?;
    let path = output_path_for(&config.output_dir, &output.title, &output.page_id);
    write_output(&path, &output.markdown).await?;
    info!("Saved to {}", path.display());
    Ok((path, output))
}

/// Synchronous wrapper around [`export_page`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync(
    page_id: impl AsRef<str>,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_page(page_id, config))
}

/// Build the image relocator described by `config`, if a store is configured.
pub fn build_relocator(config: &ExportConfig) -> Result<Option<ImageRelocator>, ExportError> {
    let Some(ref store_config) = config.store else {
        info!("No object store configured; images keep their source URLs");
        return Ok(None);
    };

    let store = S3Store::new(store_config, config.upload_timeout_secs)?;
    let downloader = HttpDownloader::new(config.download_timeout_secs)?;
    let relocator = ImageRelocator::new(
        Arc::new(store),
        Arc::new(downloader),
        store_config.clone(),
        config.staging_dir(),
    )
    .with_dedupe(config.dedupe_images)
    .with_progress(config.progress_callback.clone());

    Ok(Some(relocator))
}

// ── Output file ──────────────────────────────────────────────────────────

static RE_UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9 ._-]").unwrap());

/// Replace every character outside `[A-Za-z0-9 ._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    RE_UNSAFE_FILENAME_CHARS.replace_all(name, "_").into_owned()
}

/// `{dir}/{title or page_id}.md`, sanitised.
pub fn output_path_for(dir: &Path, title: &str, page_id: &str) -> PathBuf {
    let stem = if title.is_empty() { page_id } else { title };
    dir.join(sanitize_filename(&format!("{stem}.md")))
}

/// Write `markdown` to `path`, creating the parent directory if needed.
///
/// Uses atomic write (temp file + rename) to prevent partial files. The file
/// always ends with a newline; one is added only when `markdown` lacks it.
pub async fn write_output(path: &Path, markdown: &str) -> Result<(), ExportError> {
    let write_err = |source: std::io::Error| ExportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut contents = markdown.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents.as_bytes())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(())
}
