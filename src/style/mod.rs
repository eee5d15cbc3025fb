//! The style model: identifiers, properties, and the per-job reference set.
//!
//! A [`ReferenceStyleSet`] is built once per job from a reference Word
//! document (see [`extract`]) and never mutated afterwards. User overrides
//! are layered on top at point of use by [`merge::ResolvedStyles`], so the
//! same reference set can be shared by any number of concurrent jobs.
//!
//! ## Units
//!
//! Font sizes and spacing are stored in points; page geometry in twips
//! (1/20 pt), which is what WordprocessingML uses for section properties.

pub mod extract;
pub mod merge;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use extract::extract_style_model;
pub use merge::ResolvedStyles;

// ── Identifiers ──────────────────────────────────────────────────────────

/// A named category of formatting, independent of any single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StyleId {
    Title,
    /// `heading-1` … `heading-6`.
    Heading(u8),
    Body,
    Quote,
    ListBullet,
    ListNumber,
    TocHeading,
}

impl StyleId {
    /// Every identifier the library knows, in a stable order.
    pub fn all() -> impl Iterator<Item = StyleId> {
        [StyleId::Title]
            .into_iter()
            .chain((1..=6).map(StyleId::Heading))
            .chain([
                StyleId::Body,
                StyleId::Quote,
                StyleId::ListBullet,
                StyleId::ListNumber,
                StyleId::TocHeading,
            ])
    }

    /// The heading identifier for a nesting level, clamped to 1..=6.
    pub fn heading(level: u8) -> StyleId {
        StyleId::Heading(level.clamp(1, 6))
    }

    /// The built-in WordprocessingML style id (`styleId` attribute).
    pub fn default_docx_id(&self) -> String {
        match self {
            StyleId::Title => "Title".into(),
            StyleId::Heading(n) => format!("Heading{n}"),
            StyleId::Body => "Normal".into(),
            StyleId::Quote => "Quote".into(),
            StyleId::ListBullet => "ListBullet".into(),
            StyleId::ListNumber => "ListNumber".into(),
            StyleId::TocHeading => "TOCHeading".into(),
        }
    }

    /// The built-in WordprocessingML style name (`w:name` value).
    pub fn default_docx_name(&self) -> String {
        match self {
            StyleId::Title => "Title".into(),
            StyleId::Heading(n) => format!("heading {n}"),
            StyleId::Body => "Normal".into(),
            StyleId::Quote => "Quote".into(),
            StyleId::ListBullet => "List Bullet".into(),
            StyleId::ListNumber => "List Number".into(),
            StyleId::TocHeading => "TOC Heading".into(),
        }
    }

    /// Map a Word style name (`heading 1`, `Normal`, `Intense Quote`, …).
    pub fn from_docx_name(name: &str) -> Option<StyleId> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "title" => Some(StyleId::Title),
            "normal" => Some(StyleId::Body),
            "quote" | "intense quote" => Some(StyleId::Quote),
            "list bullet" => Some(StyleId::ListBullet),
            "list number" => Some(StyleId::ListNumber),
            "toc heading" => Some(StyleId::TocHeading),
            _ => lower
                .strip_prefix("heading ")
                .and_then(|n| n.trim().parse::<u8>().ok())
                .filter(|n| (1..=6).contains(n))
                .map(StyleId::Heading),
        }
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleId::Title => f.write_str("title"),
            StyleId::Heading(n) => write!(f, "heading-{n}"),
            StyleId::Body => f.write_str("body"),
            StyleId::Quote => f.write_str("quote"),
            StyleId::ListBullet => f.write_str("list-bullet"),
            StyleId::ListNumber => f.write_str("list-number"),
            StyleId::TocHeading => f.write_str("toc-heading"),
        }
    }
}

impl FromStr for StyleId {
    type Err = String;

    /// Accepts `heading-1`, `heading_1`, `Heading 1`, `h1`, `Normal`, `body`, …
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        let id = match norm.as_str() {
            "title" => StyleId::Title,
            "body" | "normal" => StyleId::Body,
            "quote" | "blockquote" | "intense-quote" => StyleId::Quote,
            "list-bullet" | "bullet" => StyleId::ListBullet,
            "list-number" | "numbered" => StyleId::ListNumber,
            "toc-heading" | "contents" => StyleId::TocHeading,
            other => {
                let digits = other
                    .strip_prefix("heading-")
                    .or_else(|| other.strip_prefix("heading"))
                    .or_else(|| other.strip_prefix('h'));
                match digits.and_then(|d| d.parse::<u8>().ok()) {
                    Some(n) if (1..=6).contains(&n) => StyleId::Heading(n),
                    _ => return Err(format!("unknown style identifier '{s}'")),
                }
            }
        };
        Ok(id)
    }
}

impl TryFrom<String> for StyleId {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StyleId> for String {
    fn from(id: StyleId) -> Self {
        id.to_string()
    }
}

// ── Properties ───────────────────────────────────────────────────────────

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[serde(alias = "centre")]
    Center,
    Right,
    #[serde(alias = "both")]
    Justify,
}

impl Alignment {
    /// The `w:jc` value.
    pub fn docx_value(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }

    /// Parse a `w:jc` value (`start`/`end` are the strict-OOXML spellings).
    pub fn from_docx(value: &str) -> Option<Alignment> {
        match value {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// Formatting attributes of a style. Every field is optional: `None` means
/// "inherit" from whatever lies underneath.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleProperties {
    #[serde(default, alias = "font_name", skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, alias = "font_size", skip_serializing_if = "Option::is_none")]
    pub font_size_pt: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    /// Hex `RRGGBB`, without `#`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, alias = "space_before", skip_serializing_if = "Option::is_none")]
    pub space_before_pt: Option<f32>,
    #[serde(default, alias = "space_after", skip_serializing_if = "Option::is_none")]
    pub space_after_pt: Option<f32>,
    #[serde(default, alias = "left_indent", skip_serializing_if = "Option::is_none")]
    pub indent_left_pt: Option<f32>,
    #[serde(default, alias = "first_line_indent", skip_serializing_if = "Option::is_none")]
    pub indent_first_line_pt: Option<f32>,
    /// Multiple of single spacing (1.0 = single).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f32>,
}

impl StyleProperties {
    /// Field-wise "mine if set, otherwise `base`'s".
    pub fn layered_over(&self, base: &StyleProperties) -> StyleProperties {
        StyleProperties {
            font_family: self.font_family.clone().or_else(|| base.font_family.clone()),
            font_size_pt: self.font_size_pt.or(base.font_size_pt),
            bold: self.bold.or(base.bold),
            italic: self.italic.or(base.italic),
            color: self.color.clone().or_else(|| base.color.clone()),
            alignment: self.alignment.or(base.alignment),
            space_before_pt: self.space_before_pt.or(base.space_before_pt),
            space_after_pt: self.space_after_pt.or(base.space_after_pt),
            indent_left_pt: self.indent_left_pt.or(base.indent_left_pt),
            indent_first_line_pt: self.indent_first_line_pt.or(base.indent_first_line_pt),
            line_spacing: self.line_spacing.or(base.line_spacing),
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == StyleProperties::default()
    }

    /// Only the character-level fields (font, size, weight, slant, colour).
    pub fn character_only(&self) -> StyleProperties {
        StyleProperties {
            font_family: self.font_family.clone(),
            font_size_pt: self.font_size_pt,
            bold: self.bold,
            italic: self.italic,
            color: self.color.clone(),
            ..StyleProperties::default()
        }
    }
}

// ── Page setup ───────────────────────────────────────────────────────────

/// Page size and margins, in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSetup {
    pub width: u32,
    pub height: u32,
    pub margin_top: i32,
    pub margin_right: u32,
    pub margin_bottom: i32,
    pub margin_left: u32,
}

impl Default for PageSetup {
    /// US Letter with one-inch margins, Word's own default.
    fn default() -> Self {
        Self {
            width: 12240,
            height: 15840,
            margin_top: 1440,
            margin_right: 1440,
            margin_bottom: 1440,
            margin_left: 1440,
        }
    }
}

// ── Built-in defaults ────────────────────────────────────────────────────

/// Properties used for an identifier the reference document does not define.
pub fn builtin_properties(id: StyleId) -> StyleProperties {
    let heading = |size: f32, before: f32| StyleProperties {
        font_size_pt: Some(size),
        bold: Some(true),
        space_before_pt: Some(before),
        space_after_pt: Some(6.0),
        ..StyleProperties::default()
    };
    match id {
        StyleId::Title => StyleProperties {
            font_size_pt: Some(28.0),
            alignment: Some(Alignment::Center),
            space_after_pt: Some(12.0),
            ..StyleProperties::default()
        },
        StyleId::Heading(1) | StyleId::TocHeading => heading(16.0, 24.0),
        StyleId::Heading(2) => heading(13.0, 18.0),
        StyleId::Heading(3) => heading(12.0, 12.0),
        StyleId::Heading(_) => StyleProperties {
            italic: Some(true),
            ..heading(11.0, 12.0)
        },
        StyleId::Body => StyleProperties {
            font_family: Some("Calibri".into()),
            font_size_pt: Some(11.0),
            space_after_pt: Some(8.0),
            line_spacing: Some(1.08),
            ..StyleProperties::default()
        },
        StyleId::Quote => StyleProperties {
            italic: Some(true),
            indent_left_pt: Some(36.0),
            space_before_pt: Some(12.0),
            space_after_pt: Some(12.0),
            ..StyleProperties::default()
        },
        StyleId::ListBullet | StyleId::ListNumber => StyleProperties {
            indent_left_pt: Some(36.0),
            space_after_pt: Some(4.0),
            ..StyleProperties::default()
        },
    }
}

// ── Reference style set ──────────────────────────────────────────────────

/// Styles extracted from a reference document. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ReferenceStyleSet {
    styles: BTreeMap<StyleId, StyleProperties>,
    docx_ids: BTreeMap<StyleId, String>,
    heading_order: Vec<StyleId>,
    page: PageSetup,
    styles_xml: Option<Arc<str>>,
}

impl ReferenceStyleSet {
    /// Build a style set in memory (no reference file).
    pub fn new(styles: impl IntoIterator<Item = (StyleId, StyleProperties)>) -> Self {
        let styles: BTreeMap<_, _> = styles.into_iter().collect();
        let heading_order = heading_order_of(styles.keys().copied());
        Self {
            styles,
            heading_order,
            ..Self::default()
        }
    }

    /// Replace the page setup.
    pub fn with_page_setup(mut self, page: PageSetup) -> Self {
        self.page = page;
        self
    }

    pub(crate) fn from_parts(
        styles: BTreeMap<StyleId, StyleProperties>,
        docx_ids: BTreeMap<StyleId, String>,
        page: PageSetup,
        styles_xml: Option<Arc<str>>,
    ) -> Self {
        let heading_order = heading_order_of(styles.keys().copied());
        Self {
            styles,
            docx_ids,
            heading_order,
            page,
            styles_xml,
        }
    }

    /// Properties the reference defines for `id`, if any.
    pub fn get(&self, id: StyleId) -> Option<&StyleProperties> {
        self.styles.get(&id)
    }

    /// True when the reference defines `id`.
    pub fn contains(&self, id: StyleId) -> bool {
        self.styles.contains_key(&id)
    }

    /// Reference properties, falling back to the built-in default set.
    ///
    /// `toc-heading` falls back to the reference's `heading-1` before the
    /// built-in default.
    pub fn resolve(&self, id: StyleId) -> StyleProperties {
        if let Some(p) = self.styles.get(&id) {
            return p.clone();
        }
        if id == StyleId::TocHeading {
            if let Some(p) = self.styles.get(&StyleId::Heading(1)) {
                return p.clone();
            }
        }
        builtin_properties(id)
    }

    /// All identifiers the reference defines.
    pub fn ids(&self) -> impl Iterator<Item = StyleId> + '_ {
        self.styles.keys().copied()
    }

    /// Heading identifiers found, outermost first.
    pub fn heading_order(&self) -> &[StyleId] {
        &self.heading_order
    }

    pub fn page_setup(&self) -> &PageSetup {
        &self.page
    }

    /// The `styleId` to reference in the output for `id`.
    pub fn docx_id(&self, id: StyleId) -> String {
        match self.docx_ids.get(&id) {
            Some(s) => s.clone(),
            None if id == StyleId::TocHeading && !self.docx_ids.is_empty() => {
                self.docx_id(StyleId::Heading(1))
            }
            None => id.default_docx_id(),
        }
    }

    /// The reference's `word/styles.xml`, when extracted from a file.
    pub fn styles_xml(&self) -> Option<&str> {
        self.styles_xml.as_deref()
    }

    /// Number of identifiers defined.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

fn heading_order_of(ids: impl Iterator<Item = StyleId>) -> Vec<StyleId> {
    let mut headings: Vec<StyleId> = ids
        .filter(|id| matches!(id, StyleId::Title | StyleId::Heading(_)))
        .collect();
    headings.sort();
    headings
}
