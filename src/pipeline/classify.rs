//! Book vs. single-unit classification.

use crate::config::HeadingDetection;
use crate::structure::StructuralNode;
use serde::{Deserialize, Serialize};

/// Overall shape of a document; decides the heading-level policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Several top-level divisions (chapters), possibly with front matter.
    Book,
    /// An essay, article or single chapter.
    SingleUnit,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DocumentType::Book => "book",
            DocumentType::SingleUnit => "single_unit",
        })
    }
}

const BOOK_MIN_TOP_LEVEL: usize = 3;
const BOOK_MIN_WITH_CONTENTS: usize = 2;

/// `Book` with at least three level-1 headings, or a table of contents and
/// at least two; otherwise `SingleUnit`.
///
/// Levels are counted after keyword remapping, so `## Chapter 2` is
/// top-level under the default detection settings.
pub fn classify(nodes: &[StructuralNode], detection: &HeadingDetection) -> DocumentType {
    let top_level = nodes
        .iter()
        .filter(|n| match n {
            StructuralNode::Heading { level, text, .. } => detection.effective_level(*level, text) == 1,
            _ => false,
        })
        .count();
    let has_contents = nodes.iter().any(|n| is_contents_marker(n, detection));

    if top_level >= BOOK_MIN_TOP_LEVEL || (has_contents && top_level >= BOOK_MIN_WITH_CONTENTS) {
        DocumentType::Book
    } else {
        DocumentType::SingleUnit
    }
}

/// A heading, or a one-line paragraph, naming the table of contents.
fn is_contents_marker(node: &StructuralNode, detection: &HeadingDetection) -> bool {
    match node {
        StructuralNode::Heading { text, .. } => detection.is_contents(text),
        StructuralNode::Paragraph { .. } => {
            let text = node.text();
            !text.contains('\n')
                && text.chars().count() <= detection.max_heading_chars
                && detection.is_contents(&text)
        }
        _ => false,
    }
}
