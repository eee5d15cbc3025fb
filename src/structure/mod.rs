//! Structural representation of a document and the ways of producing it.
//!
//! Both structuring paths emit the same lightweight markup, which
//! [`markup::parse`] turns into [`StructuralNode`]s:
//!
//! ```text
//! chunk text ──┬─ oracle::StructuringOracle ─ cleanup ─┐
//!              └─ heuristic::annotate ─────────────────┴─ markup::parse ─ nodes
//! ```

pub mod cleanup;
pub mod heuristic;
pub mod markup;
pub mod oracle;

use serde::{Deserialize, Serialize};

/// Writing-system class of a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptClass {
    #[default]
    Plain,
    /// Romanised text carrying scholarly diacritics (ā, ṛ, ś, …).
    Transliterated,
    /// Text in a non-Latin script (Devanagari, Greek, Arabic, CJK, …).
    NonLatin,
}

impl ScriptClass {
    /// Classify a piece of text. Non-Latin wins over transliterated.
    pub fn of(text: &str) -> ScriptClass {
        if text.chars().any(is_non_latin) {
            ScriptClass::NonLatin
        } else if text.chars().any(is_transliteration_mark) {
            ScriptClass::Transliterated
        } else {
            ScriptClass::Plain
        }
    }
}

fn is_non_latin(c: char) -> bool {
    matches!(c,
        '\u{0370}'..='\u{03FF}'     // Greek
        | '\u{0400}'..='\u{052F}'   // Cyrillic
        | '\u{0590}'..='\u{05FF}'   // Hebrew
        | '\u{0600}'..='\u{06FF}'   // Arabic
        | '\u{0900}'..='\u{0DFF}'   // Indic scripts
        | '\u{0E00}'..='\u{0FFF}'   // Thai, Lao, Tibetan
        | '\u{3040}'..='\u{30FF}'   // Kana
        | '\u{3400}'..='\u{9FFF}'   // CJK
        | '\u{AC00}'..='\u{D7AF}')  // Hangul
}

fn is_transliteration_mark(c: char) -> bool {
    matches!(
        c,
        'ā' | 'Ā' | 'ī' | 'Ī' | 'ū' | 'Ū' | 'ṛ' | 'Ṛ' | 'ṝ' | 'Ṝ' | 'ḷ' | 'Ḷ' | 'ṅ' | 'Ṅ'
            | 'ñ' | 'Ñ' | 'ṭ' | 'Ṭ' | 'ḍ' | 'Ḍ' | 'ṇ' | 'Ṇ' | 'ś' | 'Ś' | 'ṣ' | 'Ṣ' | 'ṃ'
            | 'Ṃ' | 'ḥ' | 'Ḥ'
    )
}

/// A span of paragraph text with uniform formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// May contain `\n` for a line break inside the paragraph.
    pub text: String,
    pub script_class: ScriptClass,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            script_class: ScriptClass::of(&text),
            text,
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Ordered,
    Unordered,
}

/// One structural unit of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralNode {
    Heading {
        level: u8,
        text: String,
        script_class: ScriptClass,
    },
    Paragraph {
        runs: Vec<Run>,
    },
    ListItem {
        kind: ListKind,
        /// 0 = outermost.
        level: u8,
        text: String,
    },
    TableRow {
        cells: Vec<String>,
    },
    Blockquote {
        lines: Vec<String>,
    },
    PageBreak,
}

impl StructuralNode {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        let text = text.into();
        StructuralNode::Heading {
            level,
            script_class: ScriptClass::of(&text),
            text,
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        StructuralNode::Paragraph {
            runs: vec![Run::plain(text)],
        }
    }

    /// Concatenated visible text.
    pub fn text(&self) -> String {
        match self {
            StructuralNode::Heading { text, .. } | StructuralNode::ListItem { text, .. } => {
                text.clone()
            }
            StructuralNode::Paragraph { runs } => runs.iter().map(|r| r.text.as_str()).collect(),
            StructuralNode::TableRow { cells } => cells.join(" | "),
            StructuralNode::Blockquote { lines } => lines.join("\n"),
            StructuralNode::PageBreak => String::new(),
        }
    }

    /// Discriminant-only shape, used to compare structuring paths.
    pub fn shape(&self) -> &'static str {
        match self {
            StructuralNode::Heading { .. } => "heading",
            StructuralNode::Paragraph { .. } => "paragraph",
            StructuralNode::ListItem { .. } => "list_item",
            StructuralNode::TableRow { .. } => "table_row",
            StructuralNode::Blockquote { .. } => "blockquote",
            StructuralNode::PageBreak => "page_break",
        }
    }
}
