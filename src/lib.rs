//! # notion2md
//!
//! Export a Notion page to a single Markdown file, moving its images to
//! S3-compatible object storage (Cloudflare R2, AWS S3, MinIO, …) so the
//! exported document does not depend on Notion's short-lived file URLs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page id
//!  │
//!  ├─ 1. Fetch     title + properties, then every block page by page
//!  ├─ 2. Convert   one Markdown fragment per block (type dispatch)
//!  ├─ 3. Relocate  image URL → MD5 key → download → upload → public URL
//!  ├─ 4. Assemble  title, property list, fragments with blank-line rules
//!  └─ 5. Output    {output_dir}/{title}.md
//! ```
//!
//! Per-image and per-property failures never abort an export: images keep
//! their original URL and properties render with a `(parse error: …)` note.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notion2md::{export_to_file, ExportConfig, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::builder()
//!         .token(std::env::var("NOTION_TOKEN")?)
//!         .store(
//!             StoreConfig::new(std::env::var("R2_ENDPOINT")?, "blog")
//!                 .credentials(std::env::var("R2_ACCESS_KEY")?, std::env::var("R2_SECRET_KEY")?)
//!                 .key_prefix("images"),
//!         )
//!         .build()?;
//!     let (path, output) = export_to_file("0123456789abcdef0123456789abcdef", &config).await?;
//!     eprintln!("{} ({} blocks)", path.display(), output.stats.total_blocks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notion2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, StoreConfig};
pub use error::{ExportError, RelocationError};
pub use export::{
    build_relocator, export_page, export_sync, export_to_file, export_with, output_path_for,
    sanitize_filename, write_output,
};
pub use model::{
    Block, BlockKind, Document, ExportOutput, ExportStats, ImageReference, Property, TextRun,
};
pub use pipeline::relocate::{HttpDownloader, ImageDownloader, ImageRelocator, Relocation};
pub use pipeline::source::{DocumentSource, NotionClient, PageMeta};
pub use pipeline::store::{ObjectStore, S3Store};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
