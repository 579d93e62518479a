//! Document assembly: title, property block and block fragments → one Markdown text.
//!
//! ## Layout
//!
//! ```text
//! # {title}
//!
//! - {property}: {value}      ┐ only when the page has properties
//! - …                        │
//!                            ┘
//! {fragment}
//!                            ← one blank line unless the pair is exempt
//! {fragment}
//! ```
//!
//! Blank fragments are dropped before spacing is decided, so they never
//! produce a separator of their own. The separator between two emitted
//! fragments is a single blank line; exempt pairs (list continuations and
//! anything touching a heading) get none.

use crate::model::{BlockKind, Document, Property};
use crate::pipeline::blocks::{BlockConverter, Fragment};
use crate::pipeline::properties::property_lines;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use tracing::debug;

/// A rendered document plus the per-block fragments it was built from.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub markdown: String,
    /// One entry per source block, in document order (blank ones included).
    pub fragments: Vec<Fragment>,
}

/// Continuity policy: should a blank line separate `previous` and `current`?
pub fn needs_separator(previous: BlockKind, current: BlockKind) -> bool {
    !matches!(
        (previous, current),
        (BlockKind::BulletItem, BlockKind::BulletItem)
            | (BlockKind::NumberedItem, BlockKind::NumberedItem)
            | (BlockKind::Heading, _)
            | (_, BlockKind::Heading)
    )
}

/// Join title, properties and already-converted fragments.
pub fn assemble(
    title: &str,
    properties: &[(String, Property)],
    fragments: &[Fragment],
) -> String {
    let mut lines: Vec<String> = vec![format!("# {title}"), String::new()];

    if !properties.is_empty() {
        lines.extend(property_lines(properties));
        lines.push(String::new());
    }

    let mut previous: Option<BlockKind> = None;
    for fragment in fragments {
        if fragment.is_blank() {
            continue;
        }
        if let Some(prev) = previous {
            if needs_separator(prev, fragment.kind) {
                lines.push(String::new());
            }
        }
        lines.push(fragment.markdown.clone());
        previous = Some(fragment.kind);
    }

    lines.join("\n")
}

/// Convert every block and assemble the document.
///
/// Up to `concurrency` blocks are converted at once (only image blocks do
/// any waiting); results are collected in document order before spacing is
/// decided, so the output does not depend on completion order.
pub async fn render_document(
    document: &Document,
    converter: BlockConverter<'_>,
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> RenderedDocument {
    let total = document.blocks.len();
    debug!("Converting {} blocks (concurrency {})", total, concurrency);

    let fragments: Vec<Fragment> = stream::iter(document.blocks.iter().enumerate().map(
        move |(index, block)| async move { (index, converter.convert(block).await) },
    ))
    .buffered(concurrency.max(1))
    .map(|(index, fragment)| {
        if let Some(cb) = progress {
            cb.on_block_converted(index + 1, total);
        }
        fragment
    })
    .collect()
    .await;

    let markdown = assemble(&document.title, &document.properties, &fragments);
    RenderedDocument {
        markdown,
        fragments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, TextRun};

    fn runs(s: &str) -> Vec<TextRun> {
        vec![TextRun::new(s)]
    }

    fn frag(kind: BlockKind, md: &str) -> Fragment {
        Fragment {
            kind,
            markdown: md.to_string(),
            relocation: None,
        }
    }

    async fn render(title: &str, properties: Vec<(String, Property)>, blocks: Vec<Block>) -> String {
        let doc = Document {
            title: title.into(),
            properties,
            blocks,
        };
        render_document(&doc, BlockConverter::new(None), 4, None)
            .await
            .markdown
    }

    #[test]
    fn separator_policy() {
        use BlockKind::*;
        assert!(!needs_separator(BulletItem, BulletItem));
        assert!(!needs_separator(NumberedItem, NumberedItem));
        assert!(!needs_separator(Heading, Paragraph));
        assert!(!needs_separator(Paragraph, Heading));
        assert!(!needs_separator(Heading, Heading));
        assert!(needs_separator(BulletItem, NumberedItem));
        assert!(needs_separator(NumberedItem, BulletItem));
        assert!(needs_separator(Paragraph, Paragraph));
        assert!(needs_separator(TodoItem, TodoItem));
        assert!(needs_separator(BulletItem, Divider));
        assert!(needs_separator(Image, Code));
    }

    #[tokio::test]
    async fn empty_document_is_title_and_blank_line() {
        assert_eq!(render("Notes", vec![], vec![]).await, "# Notes\n");
    }

    #[tokio::test]
    async fn empty_document_with_properties() {
        let props = vec![
            ("Status".to_string(), Property::Select(None)),
            ("Tags".to_string(), Property::MultiSelect(vec!["a".into(), "b".into()])),
        ];
        assert_eq!(
            render("Notes", props, vec![]).await,
            "# Notes\n\n- Status: \n- Tags: a, b\n"
        );
    }

    #[tokio::test]
    async fn spacing_scenario() {
        let blocks = vec![
            Block::Heading {
                level: 1,
                rich_text: runs("Title"),
            },
            Block::Paragraph {
                rich_text: runs("Hello"),
            },
            Block::BulletItem { rich_text: runs("A") },
            Block::BulletItem { rich_text: runs("B") },
            Block::Divider,
        ];
        assert_eq!(
            render("Doc", vec![], blocks).await,
            "# Doc\n\n# Title\nHello\n\n- A\n- B\n\n---"
        );
    }

    #[tokio::test]
    async fn headings_have_no_blank_lines_around_them() {
        let blocks = vec![
            Block::Paragraph { rich_text: runs("p1") },
            Block::Heading {
                level: 2,
                rich_text: runs("Section"),
            },
            Block::Heading {
                level: 3,
                rich_text: runs("Sub"),
            },
            Block::Paragraph { rich_text: runs("p2") },
        ];
        assert_eq!(
            render("T", vec![], blocks).await,
            "# T\n\np1\n## Section\n### Sub\np2"
        );
    }

    #[tokio::test]
    async fn blank_blocks_are_skipped_entirely() {
        let blocks = vec![
            Block::BulletItem { rich_text: runs("A") },
            Block::Paragraph { rich_text: vec![] },
            Block::BulletItem { rich_text: runs("B") },
            Block::Paragraph {
                rich_text: runs("  "),
            },
            Block::Paragraph { rich_text: runs("end") },
        ];
        assert_eq!(render("T", vec![], blocks).await, "# T\n\n- A\n- B\n\nend");
    }

    #[tokio::test]
    async fn numbered_items_stay_together_and_are_not_renumbered() {
        let blocks = vec![
            Block::NumberedItem { rich_text: runs("one") },
            Block::NumberedItem { rich_text: runs("two") },
            Block::BulletItem { rich_text: runs("x") },
        ];
        assert_eq!(
            render("T", vec![], blocks).await,
            "# T\n\n1. one\n1. two\n\n- x"
        );
    }

    #[tokio::test]
    async fn properties_then_blocks() {
        let props = vec![("Date".to_string(), Property::Date(Some("2024-01-02".into())))];
        let blocks = vec![Block::Paragraph { rich_text: runs("body") }];
        assert_eq!(
            render("T", props, blocks).await,
            "# T\n\n- Date: 2024-01-02\n\nbody"
        );
    }

    #[tokio::test]
    async fn text_blocks_without_payload_keep_list_continuity() {
        use crate::pipeline::source::decode_block;
        use serde_json::json;

        let rt = |s: &str| json!([{ "plain_text": s }]);
        let blocks = [
            json!({ "type": "bulleted_list_item", "bulleted_list_item": { "rich_text": rt("A") } }),
            json!({ "type": "bulleted_list_item", "bulleted_list_item": {} }),
            json!({ "type": "bulleted_list_item", "bulleted_list_item": { "rich_text": rt("B") } }),
            json!({ "type": "quote", "quote": {} }),
        ]
        .iter()
        .map(decode_block)
        .collect();

        assert_eq!(
            render("T", vec![], blocks).await,
            "# T\n\n- A\n- (no content)\n- B\n\n> (no content)"
        );
    }

    #[test]
    fn never_two_consecutive_blank_lines() {
        use BlockKind::*;
        let kinds = [
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
        ];
        let mut fragments = Vec::new();
        for a in kinds {
            for b in kinds {
                fragments.push(frag(a, "x"));
                fragments.push(frag(Paragraph, ""));
                fragments.push(frag(b, "y"));
            }
        }
        let props = vec![("P".to_string(), Property::Checkbox(false))];
        let out = assemble("T", &props, &fragments);
        assert!(!out.contains("\n\n\n"), "found a double blank line");
    }
}
