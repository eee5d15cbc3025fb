//! Structural mapping: nodes + document type + styles → styled elements.
//!
//! This is where the formatting policy lives:
//!
//! * **Heading identifiers.** The markup level is authoritative unless a
//!   chapter/section keyword remaps it (see [`crate::config::KeywordPrecedence`]). In a
//!   book, the opening title heading becomes `title` and the table of
//!   contents heading becomes `toc-heading`.
//! * **Page breaks.** Inserted before keyword, level, chapter or section
//!   headings as configured; never before the first element and never on
//!   top of an explicit break.
//! * **Quotes, scripts, tables, lists, separators.** See the per-node
//!   helpers below.
//!
//! The mapper is pure: the same nodes and configuration always give the
//! same elements.

use crate::config::{ConversionConfig, KeywordKind, SeparatorPosition};
use crate::config::starts_with_any;
use crate::docx::symbols::SeparatorImage;
use crate::pipeline::classify::DocumentType;
use crate::structure::markup::split_by_script;
use crate::structure::{ListKind, Run, ScriptClass, StructuralNode};
use crate::style::merge::ResolvedStyles;
use crate::style::{Alignment, StyleId, StyleProperties};
use serde::Serialize;

/// Deepest heading style; deeper markup levels share it.
const MAX_HEADING_STYLE: u8 = 6;

/// What an element is, independent of how it is styled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Heading { level: u8 },
    Paragraph,
    ListItem { kind: ListKind, level: u8 },
    /// Rows are padded to a common width.
    Table { rows: Vec<Vec<String>> },
    Quote,
    PageBreak,
    /// Ornament paragraph next to a chapter heading: a symbol run, or the
    /// image read from the configured symbols document.
    Separator { image: Option<SeparatorImage> },
}

/// A run of text with its direct character formatting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledRun {
    /// `\n` is a line break.
    pub text: String,
    pub props: StyleProperties,
}

impl StyledRun {
    fn new(text: impl Into<String>, props: StyleProperties) -> Self {
        Self {
            text: text.into(),
            props,
        }
    }
}

/// One output block with everything the assembler needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub kind: ElementKind,
    pub style: StyleId,
    /// Fully resolved properties (reference, defaults, overrides, policy).
    pub effective: StyleProperties,
    /// Properties the output must state explicitly on the paragraph.
    pub direct: StyleProperties,
    pub runs: Vec<StyledRun>,
    pub page_break_before: bool,
}

impl Element {
    /// Visible text of the element.
    pub fn text(&self) -> String {
        match &self.kind {
            ElementKind::Table { rows } => rows
                .iter()
                .map(|r| r.join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.runs.iter().map(|r| r.text.as_str()).collect(),
        }
    }
}

/// Map structural nodes to styled elements.
pub fn map_document(
    nodes: &[StructuralNode],
    doc_type: DocumentType,
    config: &ConversionConfig,
    styles: &ResolvedStyles,
) -> Vec<Element> {
    let mapper = Mapper {
        config,
        styles,
        doc_type,
        title_index: title_heading_index(nodes, doc_type, config),
    };
    mapper.run(nodes)
}

struct Mapper<'a> {
    config: &'a ConversionConfig,
    styles: &'a ResolvedStyles,
    doc_type: DocumentType,
    title_index: Option<usize>,
}

impl Mapper<'_> {
    fn run(&self, nodes: &[StructuralNode]) -> Vec<Element> {
        let mut out: Vec<Element> = Vec::with_capacity(nodes.len());
        let mut table: Vec<Vec<String>> = Vec::new();

        for (i, node) in nodes.iter().enumerate() {
            if let StructuralNode::TableRow { cells } = node {
                table.push(cells.clone());
                continue;
            }
            if !table.is_empty() {
                out.push(self.table(std::mem::take(&mut table)));
            }
            match node {
                StructuralNode::Heading { level, text, .. } => self.heading(&mut out, i, *level, text),
                StructuralNode::Paragraph { runs } => out.push(self.paragraph(runs)),
                StructuralNode::ListItem { kind, level, text } => {
                    out.push(self.list_item(*kind, *level, text))
                }
                StructuralNode::Blockquote { lines } => out.push(self.quote(lines)),
                StructuralNode::PageBreak => {
                    if self.config.page_breaks.preserve_original {
                        push_page_break(&mut out);
                    }
                }
                StructuralNode::TableRow { .. } => {}
            }
        }
        if !table.is_empty() {
            out.push(self.table(table));
        }

        // A document never opens or closes on a break.
        while out.last().is_some_and(|e| e.kind == ElementKind::PageBreak) {
            out.pop();
        }
        if let Some(first) = out.first_mut() {
            first.page_break_before = false;
        }
        out
    }

    // ── Headings ─────────────────────────────────────────────────────────

    fn heading(&self, out: &mut Vec<Element>, index: usize, level: u8, text: &str) {
        let detection = &self.config.heading_detection;
        let kind = detection.keyword_kind(text);
        let level = detection.effective_level(level, text).clamp(1, MAX_HEADING_STYLE);

        let style = if self.title_index == Some(index) {
            StyleId::Title
        } else if self.doc_type == DocumentType::Book && kind == Some(KeywordKind::Contents) {
            StyleId::TocHeading
        } else {
            StyleId::heading(level)
        };

        let breaks = &self.config.page_breaks;
        let wants_break = starts_with_any(text, &breaks.before_keywords)
            || breaks.before_levels.contains(&level)
            || (breaks.before_chapters && kind == Some(KeywordKind::Chapter))
            || (breaks.before_sections && kind == Some(KeywordKind::Section));
        let page_break_before = wants_break && !ends_with_break(out);

        let mut element = self.element(ElementKind::Heading { level }, style, self.runs_for(text, &StyleProperties::default()));
        let separator = &self.config.chapter_separator;
        let chapter = kind == Some(KeywordKind::Chapter);

        if separator.enabled && chapter && separator.position == SeparatorPosition::Before {
            let mut sep = self.separator();
            sep.page_break_before = page_break_before;
            out.push(sep);
            out.push(element);
            return;
        }
        element.page_break_before = page_break_before;
        out.push(element);
        if separator.enabled && chapter && separator.position == SeparatorPosition::After {
            out.push(self.separator());
        }
    }

    fn separator(&self) -> Element {
        let s = &self.config.chapter_separator;
        let direct = StyleProperties {
            alignment: Some(Alignment::Center),
            space_before_pt: Some(s.spacing_before),
            space_after_pt: Some(s.spacing_after),
            ..Default::default()
        };
        let run_props = StyleProperties {
            font_size_pt: Some(s.font_size),
            ..Default::default()
        };
        let style = StyleId::Body;
        let runs = match s.image {
            Some(_) => Vec::new(),
            None => vec![StyledRun::new(s.symbol.clone(), run_props)],
        };
        Element {
            kind: ElementKind::Separator { image: s.image.clone() },
            style,
            effective: direct.layered_over(&self.styles.resolve(style)),
            direct: direct.layered_over(&self.styles.direct(style)),
            runs,
            page_break_before: false,
        }
    }

    // ── Body blocks ──────────────────────────────────────────────────────

    fn paragraph(&self, runs: &[Run]) -> Element {
        let styled = runs
            .iter()
            .flat_map(|r| {
                let emphasis = StyleProperties {
                    bold: r.bold.then_some(true),
                    italic: r.italic.then_some(true),
                    ..Default::default()
                };
                self.runs_for(&r.text, &emphasis)
            })
            .collect();
        self.element(ElementKind::Paragraph, StyleId::Body, styled)
    }

    fn list_item(&self, kind: ListKind, level: u8, text: &str) -> Element {
        let style = match kind {
            ListKind::Ordered => StyleId::ListNumber,
            ListKind::Unordered => StyleId::ListBullet,
        };
        self.element(
            ElementKind::ListItem { kind, level },
            style,
            self.runs_for(text, &StyleProperties::default()),
        )
    }

    fn quote(&self, lines: &[String]) -> Element {
        let f = &self.config.blockquote_formatting;
        let text = lines
            .iter()
            .map(|l| {
                if f.remove_em_dashes {
                    strip_em_dashes(l)
                } else {
                    l.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let policy = StyleProperties {
            alignment: f.center_align.then_some(Alignment::Center),
            italic: f.italicize.then_some(true),
            line_spacing: f.single_line_spacing.then_some(1.0),
            ..Default::default()
        };
        let style = StyleId::Quote;
        let overrides = self
            .config
            .style_overrides
            .get(&style)
            .cloned()
            .unwrap_or_default();
        Element {
            kind: ElementKind::Quote,
            style,
            effective: overrides.layered_over(&policy.layered_over(&self.styles.resolve(style))),
            direct: overrides.layered_over(&policy.layered_over(&self.styles.direct(style))),
            runs: self.runs_for(&text, &StyleProperties::default()),
            page_break_before: false,
        }
    }

    fn table(&self, rows: Vec<Vec<String>>) -> Element {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        self.element(ElementKind::Table { rows }, StyleId::Body, Vec::new())
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn element(&self, kind: ElementKind, style: StyleId, runs: Vec<StyledRun>) -> Element {
        Element {
            kind,
            style,
            effective: self.styles.resolve(style),
            direct: self.styles.direct(style),
            runs,
            page_break_before: false,
        }
    }

    /// Split text by script and apply script styling under `base`.
    fn runs_for(&self, text: &str, base: &StyleProperties) -> Vec<StyledRun> {
        let scripts = &self.config.script_styling;
        split_by_script(text)
            .into_iter()
            .map(|(segment, class)| {
                let props = match class {
                    ScriptClass::Plain => base.clone(),
                    ScriptClass::Transliterated => base.layered_over(&scripts.transliterated.character_only()),
                    ScriptClass::NonLatin => base.layered_over(&scripts.non_latin.character_only()),
                };
                StyledRun::new(segment, props)
            })
            .collect()
    }
}

fn push_page_break(out: &mut Vec<Element>) {
    if out.is_empty() || ends_with_break(out) {
        return;
    }
    out.push(Element {
        kind: ElementKind::PageBreak,
        style: StyleId::Body,
        effective: StyleProperties::default(),
        direct: StyleProperties::default(),
        runs: Vec::new(),
        page_break_before: false,
    });
}

fn ends_with_break(out: &[Element]) -> bool {
    out.last().is_some_and(|e| e.kind == ElementKind::PageBreak)
}

/// Em/en dashes opening a line (attributions) are dropped; inner ones stay.
fn strip_em_dashes(line: &str) -> String {
    line.trim_start_matches(['—', '–', ' ']).to_string()
}

/// In a book, the first heading is the title unless it is itself a
/// chapter, section, contents or front-matter heading.
fn title_heading_index(
    nodes: &[StructuralNode],
    doc_type: DocumentType,
    config: &ConversionConfig,
) -> Option<usize> {
    if doc_type != DocumentType::Book {
        return None;
    }
    let (first, text) = nodes.iter().enumerate().find_map(|(i, n)| match n {
        StructuralNode::Heading { text, .. } => Some((i, text)),
        _ => None,
    })?;
    match config.heading_detection.keyword_kind(text) {
        None | Some(KeywordKind::Title) => Some(first),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChapterSeparator, KeywordPrecedence, PageBreaks};
    use crate::style::ReferenceStyleSet;
    use std::sync::Arc;

    fn styles(config: &ConversionConfig) -> ResolvedStyles {
        let reference = ReferenceStyleSet::new([
            (
                StyleId::Heading(1),
                StyleProperties {
                    font_size_pt: Some(16.0),
                    alignment: Some(Alignment::Center),
                    ..Default::default()
                },
            ),
            (
                StyleId::Body,
                StyleProperties {
                    font_size_pt: Some(12.0),
                    ..Default::default()
                },
            ),
        ]);
        ResolvedStyles::merge(Arc::new(reference), config)
    }

    fn map(nodes: &[StructuralNode], doc_type: DocumentType, config: &ConversionConfig) -> Vec<Element> {
        map_document(nodes, doc_type, config, &styles(config))
    }

    #[test]
    fn chapter_scenario() {
        let config = ConversionConfig::default();
        let nodes = vec![
            StructuralNode::heading(1, "Chapter 1: Start"),
            StructuralNode::paragraph("Hello world."),
        ];
        let els = map(&nodes, DocumentType::SingleUnit, &config);
        assert_eq!(els.len(), 2);
        assert_eq!(els[0].style, StyleId::Heading(1));
        assert_eq!(els[0].effective.font_size_pt, Some(16.0));
        assert_eq!(els[0].effective.alignment, Some(Alignment::Center));
        assert_eq!(els[0].text(), "Chapter 1: Start");
        assert_eq!(els[1].style, StyleId::Body);
        assert_eq!(els[1].text(), "Hello world.");
        assert!(els.iter().all(|e| !e.page_break_before));
        // Reference styles need no direct formatting.
        assert!(els[0].direct.is_empty());
    }

    #[test]
    fn chapter_keyword_forces_level_one() {
        let config = ConversionConfig::default();
        let els = map(
            &[StructuralNode::heading(3, "Chapter 9")],
            DocumentType::SingleUnit,
            &config,
        );
        assert_eq!(els[0].kind, ElementKind::Heading { level: 1 });

        let mut markup_wins = ConversionConfig::default();
        markup_wins.heading_detection.keyword_precedence = KeywordPrecedence::Markup;
        let els = map(
            &[StructuralNode::heading(3, "Chapter 9")],
            DocumentType::SingleUnit,
            &markup_wins,
        );
        assert_eq!(els[0].style, StyleId::Heading(3));
    }

    #[test]
    fn section_level_remap() {
        let mut config = ConversionConfig::default();
        config.heading_detection.section_heading_level = Some(3);
        let els = map(
            &[StructuralNode::heading(2, "Part Two")],
            DocumentType::SingleUnit,
            &config,
        );
        assert_eq!(els[0].style, StyleId::Heading(3));
    }

    #[test]
    fn book_title_and_contents() {
        let config = ConversionConfig::default();
        let nodes = vec![
            StructuralNode::heading(1, "The Long Road"),
            StructuralNode::heading(1, "Contents"),
            StructuralNode::heading(1, "Chapter 1"),
            StructuralNode::heading(1, "Chapter 2"),
        ];
        let els = map(&nodes, DocumentType::Book, &config);
        assert_eq!(els[0].style, StyleId::Title);
        assert_eq!(els[1].style, StyleId::TocHeading);
        assert_eq!(els[2].style, StyleId::Heading(1));
        // "contents" is a default before-keyword, never the first element.
        assert!(!els[0].page_break_before);
        assert!(els[1].page_break_before);
    }

    #[test]
    fn book_title_without_chapter_keywords() {
        let config = ConversionConfig::default();
        let nodes = vec![
            StructuralNode::heading(1, "The Long Road"),
            StructuralNode::heading(1, "Spring"),
            StructuralNode::heading(1, "Summer"),
            StructuralNode::heading(1, "Autumn"),
        ];
        let els = map(&nodes, DocumentType::Book, &config);
        assert_eq!(els[0].style, StyleId::Title);
        assert!(els[1..].iter().all(|e| e.style == StyleId::Heading(1)));

        let opens_on_chapter = vec![
            StructuralNode::heading(1, "Chapter 1"),
            StructuralNode::heading(1, "Chapter 2"),
        ];
        let els = map(&opens_on_chapter, DocumentType::Book, &config);
        assert_eq!(els[0].style, StyleId::Heading(1));
    }

    #[test]
    fn deep_markup_levels_share_the_deepest_style() {
        let els = map(
            &[StructuralNode::heading(11, "A fine point")],
            DocumentType::SingleUnit,
            &ConversionConfig::default(),
        );
        assert_eq!(els[0].kind, ElementKind::Heading { level: 6 });
        assert_eq!(els[0].style, StyleId::Heading(6));
    }

    #[test]
    fn single_unit_has_no_title() {
        let els = map(
            &[
                StructuralNode::heading(1, "Essay"),
                StructuralNode::heading(1, "Chapter 1"),
            ],
            DocumentType::SingleUnit,
            &ConversionConfig::default(),
        );
        assert_eq!(els[0].style, StyleId::Heading(1));
    }

    #[test]
    fn page_breaks_are_never_doubled_or_leading() {
        let mut config = ConversionConfig::default();
        config.page_breaks = PageBreaks {
            before_chapters: true,
            ..PageBreaks::default()
        };
        let nodes = vec![
            StructuralNode::PageBreak,
            StructuralNode::heading(1, "Chapter 1"),
            StructuralNode::paragraph("a"),
            StructuralNode::PageBreak,
            StructuralNode::PageBreak,
            StructuralNode::heading(1, "Chapter 2"),
            StructuralNode::paragraph("b"),
            StructuralNode::heading(1, "Chapter 3"),
            StructuralNode::PageBreak,
        ];
        let els = map(&nodes, DocumentType::Book, &config);
        let kinds: Vec<String> = els
            .iter()
            .map(|e| match e.kind {
                ElementKind::PageBreak => "break".to_string(),
                _ => format!("{}{}", e.text(), if e.page_break_before { "^" } else { "" }),
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["Chapter 1", "a", "break", "Chapter 2", "b", "Chapter 3^"]
        );
    }

    #[test]
    fn explicit_breaks_dropped_when_not_preserved() {
        let mut config = ConversionConfig::default();
        config.page_breaks.preserve_original = false;
        let nodes = vec![
            StructuralNode::paragraph("a"),
            StructuralNode::PageBreak,
            StructuralNode::paragraph("b"),
        ];
        let els = map(&nodes, DocumentType::SingleUnit, &config);
        assert_eq!(els.len(), 2);
    }

    #[test]
    fn blockquote_policy() {
        let config = ConversionConfig::default();
        let nodes = vec![StructuralNode::Blockquote {
            lines: vec!["To be or not to be".into(), "— Shakespeare".into()],
        }];
        let els = map(&nodes, DocumentType::SingleUnit, &config);
        let q = &els[0];
        assert_eq!(q.style, StyleId::Quote);
        assert_eq!(q.text(), "To be or not to be\nShakespeare");
        assert_eq!(q.direct.alignment, Some(Alignment::Center));
        assert_eq!(q.direct.italic, Some(true));
        assert_eq!(q.direct.line_spacing, Some(1.0));
    }

    #[test]
    fn transliterated_runs_are_italic() {
        let config = ConversionConfig::default();
        let els = map(
            &[StructuralNode::paragraph("Read the Gītā today")],
            DocumentType::SingleUnit,
            &config,
        );
        let runs = &els[0].runs;
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].text.trim(), "Gītā");
        assert_eq!(runs[1].props.italic, Some(true));
        assert_eq!(runs[0].props.italic, None);
    }

    #[test]
    fn table_rows_group_and_pad() {
        let nodes = vec![
            StructuralNode::TableRow {
                cells: vec!["a".into(), "b".into(), "c".into()],
            },
            StructuralNode::TableRow {
                cells: vec!["d".into()],
            },
            StructuralNode::paragraph("after"),
        ];
        let els = map(&nodes, DocumentType::SingleUnit, &ConversionConfig::default());
        assert_eq!(els.len(), 2);
        match &els[0].kind {
            ElementKind::Table { rows } => {
                assert_eq!(rows[1], vec!["d".to_string(), String::new(), String::new()]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn list_items_keep_kind_and_level() {
        let nodes = vec![StructuralNode::ListItem {
            kind: ListKind::Ordered,
            level: 2,
            text: "deep".into(),
        }];
        let els = map(&nodes, DocumentType::SingleUnit, &ConversionConfig::default());
        assert_eq!(
            els[0].kind,
            ElementKind::ListItem {
                kind: ListKind::Ordered,
                level: 2
            }
        );
        assert_eq!(els[0].style, StyleId::ListNumber);
        // The reference has no list style, so the built-in one is written.
        assert!(!els[0].direct.is_empty());
    }

    #[test]
    fn chapter_separator_before_carries_the_break() {
        let mut config = ConversionConfig::default();
        config.page_breaks.before_chapters = true;
        config.chapter_separator = ChapterSeparator {
            enabled: true,
            ..ChapterSeparator::default()
        };
        let nodes = vec![
            StructuralNode::paragraph("intro"),
            StructuralNode::heading(1, "Chapter 1"),
        ];
        let els = map(&nodes, DocumentType::SingleUnit, &config);
        assert_eq!(els[1].kind, ElementKind::Separator { image: None });
        assert!(els[1].page_break_before);
        assert_eq!(els[1].text(), "❦");
        assert!(!els[2].page_break_before);
    }

    #[test]
    fn image_separator_follows_the_chapter() {
        let image = SeparatorImage {
            bytes: vec![0x89, b'P', b'N', b'G'].into(),
            extension: "png".into(),
            width_emu: 457_200,
            height_emu: 228_600,
        };
        let mut config = ConversionConfig::default();
        config.chapter_separator = ChapterSeparator {
            enabled: true,
            position: SeparatorPosition::After,
            image: Some(image.clone()),
            ..ChapterSeparator::default()
        };
        let els = map(
            &[StructuralNode::heading(1, "Chapter 1")],
            DocumentType::SingleUnit,
            &config,
        );
        assert_eq!(els.len(), 2);
        assert_eq!(els[1].kind, ElementKind::Separator { image: Some(image) });
        assert!(els[1].runs.is_empty());
        assert_eq!(els[1].direct.alignment, Some(Alignment::Center));
    }

    #[test]
    fn mapping_is_deterministic() {
        let config = ConversionConfig::default();
        let nodes = vec![
            StructuralNode::heading(1, "Chapter 1"),
            StructuralNode::paragraph("x"),
        ];
        assert_eq!(
            map(&nodes, DocumentType::SingleUnit, &config),
            map(&nodes, DocumentType::SingleUnit, &config)
        );
    }
}
