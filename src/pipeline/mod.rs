//! Pipeline stages for page-to-Markdown export.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the network-facing ones sit behind traits.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ blocks ──▶ assemble ──▶ Markdown
//!              │           ▲
//!              ▼           │
//!           relocate ──▶ store        properties
//! ```
//!
//! 1. [`source`]: fetch title, properties and the paginated block list
//! 2. [`properties`]: render each typed property as one list line
//! 3. [`blocks`]: dispatch each block kind to its Markdown fragment
//! 4. [`relocate`]: download, hash, stage and upload images; fall back to
//!    the source URL on any failure
//! 5. [`store`]: S3-compatible object storage behind [`store::ObjectStore`]
//! 6. [`assemble`]: join everything with the blank-line continuity policy

pub mod assemble;
pub mod blocks;
pub mod properties;
pub mod relocate;
pub mod source;
pub mod store;
