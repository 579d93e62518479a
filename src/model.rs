//! Document model: what the source service hands us and what an export returns.
//!
//! [`Block`] and [`Property`] are closed enums with an `Unrecognized` arm.
//! The source service adds new block and property kinds over time; decoding
//! maps anything unknown (or malformed) to that arm so it is annotated in the
//! output instead of aborting the export.

use serde::{Deserialize, Serialize};

/// One run of rich text. Formatting (bold, links, …) is flattened away; only
/// the plain text survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub plain_text: String,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            plain_text: text.into(),
        }
    }
}

/// Concatenate the plain text of each run, in order, with no separator.
pub fn plain_text(runs: &[TextRun]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

/// One typed metadata value attached to a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    RichText(Vec<TextRun>),
    /// The chosen option name, if any.
    Select(Option<String>),
    /// Option names in source order.
    MultiSelect(Vec<String>),
    /// ISO start date, if set.
    Date(Option<String>),
    Number(Option<f64>),
    Checkbox(bool),
    Url(Option<String>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    /// Unknown kind, or a known kind with an unexpected payload shape.
    Unrecognized { kind: String, detail: String },
}

/// One unit of page content, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Paragraph {
        rich_text: Vec<TextRun>,
    },
    /// `level` is always 1, 2 or 3.
    Heading {
        level: u8,
        rich_text: Vec<TextRun>,
    },
    BulletItem {
        rich_text: Vec<TextRun>,
    },
    NumberedItem {
        rich_text: Vec<TextRun>,
    },
    /// `checked` is kept for completeness but the item always renders unchecked.
    TodoItem {
        rich_text: Vec<TextRun>,
        checked: bool,
    },
    Image {
        url: String,
    },
    Code {
        language: String,
        rich_text: Vec<TextRun>,
    },
    Quote {
        rich_text: Vec<TextRun>,
    },
    Divider,
    /// `rich_text` is `None` when the block carried no rich-text payload.
    Unrecognized {
        kind: String,
        rich_text: Option<Vec<TextRun>>,
    },
}

/// Payload-free discriminant of [`Block`], used by the continuity policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Paragraph,
    Heading,
    BulletItem,
    NumberedItem,
    TodoItem,
    Image,
    Code,
    Quote,
    Divider,
    Unrecognized,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Paragraph { .. } => BlockKind::Paragraph,
            Block::Heading { .. } => BlockKind::Heading,
            Block::BulletItem { .. } => BlockKind::BulletItem,
            Block::NumberedItem { .. } => BlockKind::NumberedItem,
            Block::TodoItem { .. } => BlockKind::TodoItem,
            Block::Image { .. } => BlockKind::Image,
            Block::Code { .. } => BlockKind::Code,
            Block::Quote { .. } => BlockKind::Quote,
            Block::Divider => BlockKind::Divider,
            Block::Unrecognized { .. } => BlockKind::Unrecognized,
        }
    }

    /// The block's rich-text runs, if it has a rich-text payload.
    pub fn rich_text(&self) -> Option<&[TextRun]> {
        match self {
            Block::Paragraph { rich_text }
            | Block::Heading { rich_text, .. }
            | Block::BulletItem { rich_text }
            | Block::NumberedItem { rich_text }
            | Block::TodoItem { rich_text, .. }
            | Block::Code { rich_text, .. }
            | Block::Quote { rich_text } => Some(rich_text),
            Block::Unrecognized { rich_text, .. } => rich_text.as_deref(),
            Block::Image { .. } | Block::Divider => None,
        }
    }
}

/// A page as fetched from the source service. Immutable after fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    /// Properties in the order the service returned them.
    pub properties: Vec<(String, Property)>,
    pub blocks: Vec<Block>,
}

/// Where one image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub source_url: String,
    /// Hex MD5 of the source URL string.
    pub content_hash: String,
    pub object_key: String,
    pub public_url: String,
}

/// Statistics for one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    /// Blocks returned by the source service.
    pub total_blocks: usize,
    /// Blocks that produced a non-empty fragment.
    pub emitted_blocks: usize,
    /// Blocks whose fragment was empty after trimming.
    pub skipped_blocks: usize,
    /// Images downloaded and uploaded in this run.
    pub images_relocated: usize,
    /// Images served from the per-run cache.
    pub images_reused: usize,
    /// Images left pointing at their original URL after a failure.
    pub images_fallback: usize,
    pub duration_ms: u64,
}

/// Result of a successful export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    pub page_id: String,
    pub title: String,
    pub markdown: String,
    pub stats: ExportStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_concatenates_without_separator() {
        let runs = vec![TextRun::new("Hel"), TextRun::new("lo"), TextRun::new(" world")];
        assert_eq!(plain_text(&runs), "Hello world");
        assert_eq!(plain_text(&[]), "");
    }

    #[test]
    fn rich_text_absent_for_payloadless_blocks() {
        assert!(Block::Divider.rich_text().is_none());
        assert!(Block::Image { url: "u".into() }.rich_text().is_none());
        let unknown = Block::Unrecognized {
            kind: "table".into(),
            rich_text: None,
        };
        assert!(unknown.rich_text().is_none());
    }

    #[test]
    fn kind_matches_variant() {
        let h = Block::Heading {
            level: 2,
            rich_text: vec![],
        };
        assert_eq!(h.kind(), BlockKind::Heading);
        assert_eq!(Block::Divider.kind(), BlockKind::Divider);
    }
}
