//! Block conversion: one typed content block → one Markdown fragment.
//!
//! Every kind but `Image` is a pure string transformation. Images go through
//! the [`ImageRelocator`] when one is configured; without one the source URL
//! is embedded unchanged.

use crate::model::{plain_text, Block, BlockKind};
use crate::pipeline::relocate::{ImageRelocator, Relocation};
use tracing::{debug, warn};

/// Text used for blocks that carry no rich-text payload.
pub const NO_CONTENT: &str = "(no content)";

/// Alt text of every relocated image.
pub const IMAGE_ALT: &str = "image";

/// One converted block.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub kind: BlockKind,
    /// Possibly empty, never missing.
    pub markdown: String,
    /// Set for image blocks when a relocator was used.
    pub relocation: Option<Relocation>,
}

impl Fragment {
    /// Fragments that are blank after trimming contribute nothing to the output.
    pub fn is_blank(&self) -> bool {
        self.markdown.trim().is_empty()
    }
}

/// Converts blocks, relocating images through an optional relocator.
#[derive(Clone, Copy, Default)]
pub struct BlockConverter<'a> {
    relocator: Option<&'a ImageRelocator>,
}

impl<'a> BlockConverter<'a> {
    pub fn new(relocator: Option<&'a ImageRelocator>) -> Self {
        Self { relocator }
    }

    /// Convert one block.
    pub async fn convert(&self, block: &Block) -> Fragment {
        let kind = block.kind();
        match block {
            Block::Image { url } => {
                let (target, relocation) = match self.relocator {
                    Some(relocator) => {
                        let relocation = relocator.relocate_detailed(url).await;
                        (relocation.url().to_string(), Some(relocation))
                    }
                    None => (url.clone(), None),
                };
                Fragment {
                    kind,
                    markdown: format!("![{IMAGE_ALT}]({target})"),
                    relocation,
                }
            }
            other => Fragment {
                kind,
                markdown: render_text_block(other),
                relocation: None,
            },
        }
    }
}

/// Plain text of a block: its runs concatenated, or [`NO_CONTENT`] when the
/// block has no rich-text payload.
pub fn extract_text(block: &Block) -> String {
    match block.rich_text() {
        Some(runs) => plain_text(runs),
        None => match block {
            Block::Image { url } => url.clone(),
            _ => NO_CONTENT.to_string(),
        },
    }
}

/// Markdown for every kind except images.
pub fn render_text_block(block: &Block) -> String {
    let text = extract_text(block);
    match block {
        Block::Paragraph { .. } => text,
        Block::Heading { level, .. } => {
            format!("{} {}", "#".repeat((*level).clamp(1, 3) as usize), text)
        }
        Block::BulletItem { .. } => format!("- {text}"),
        Block::NumberedItem { .. } => format!("1. {text}"),
        Block::TodoItem { checked, .. } => {
            if *checked {
                debug!("Rendering checked to-do as unchecked: {}", text);
            }
            format!("- [ ] {text}")
        }
        Block::Image { url } => format!("![{IMAGE_ALT}]({url})"),
        Block::Code { language, .. } => format!("```{language}\n{text}\n```"),
        Block::Quote { .. } => format!("> {text}"),
        Block::Divider => "---".to_string(),
        Block::Unrecognized { kind, .. } => {
            warn!("Unsupported block type '{}', emitting a marker comment", kind);
            format!("<!-- {kind} -->\n{text}")
        }
    }
}
