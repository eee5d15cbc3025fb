//! Serialise styled elements into WordprocessingML parts.
//!
//! Paragraphs reference the reference document's style ids, so every
//! property the element does not state directly is inherited from the
//! reference. Only [`Element::direct`] and run-level properties are written
//! inline.
//!
//! Elements Word cannot represent are downgraded to plain body paragraphs
//! with a [`Diagnostic::SerializationError`]:
//!
//! * list nesting deeper than 9 levels (`ilvl` 0–8),
//! * headings whose style is not the title, the contents heading or
//!   Heading 1–6,
//! * tables without a single cell.

use super::package::{OutputDocument, SEPARATOR_MEDIA, SEPARATOR_REL_ID};
use super::symbols::SeparatorImage;
use super::xml::{escape_xml, strip_illegal};
use crate::error::Diagnostic;
use crate::pipeline::map::{Element, ElementKind, StyledRun};
use crate::structure::ListKind;
use crate::style::{ReferenceStyleSet, StyleId, StyleProperties};
use std::fmt::Write as _;
use tracing::{debug, warn};

const MAX_LIST_LEVEL: u8 = 8;
const MAX_HEADING_LEVEL: u8 = 6;

const BULLET_NUM_ID: u32 = 1;
const BULLET_ABSTRACT_ID: u32 = 0;
const DECIMAL_ABSTRACT_ID: u32 = 1;

/// Build the output document for `elements`.
pub fn assemble(
    elements: &[Element],
    reference: &ReferenceStyleSet,
) -> (OutputDocument, Vec<Diagnostic>) {
    let mut w = BodyWriter::new(reference);
    for (i, element) in elements.iter().enumerate() {
        w.element(i, element);
    }
    let BodyWriter {
        body,
        diagnostics,
        used_bullets,
        ordered_blocks,
        used_styles,
        media,
        ..
    } = w;

    let document_xml = document_xml(&body, reference);
    let styles_xml = styles_xml(reference, &used_styles);
    let numbering_xml = (used_bullets || ordered_blocks > 0).then(|| numbering_xml(ordered_blocks));
    debug!(
        "Assembled {} element(s): {} bytes of document XML, {} diagnostic(s)",
        elements.len(),
        document_xml.len(),
        diagnostics.len()
    );

    (
        OutputDocument {
            document_xml,
            styles_xml,
            numbering_xml,
            separator_image: media,
        },
        diagnostics,
    )
}

// ── Body ─────────────────────────────────────────────────────────────────

struct BodyWriter<'a> {
    reference: &'a ReferenceStyleSet,
    body: String,
    diagnostics: Vec<Diagnostic>,
    used_bullets: bool,
    /// Ordered list blocks so far; block `n` uses `numId` `n + 1`.
    ordered_blocks: u32,
    /// `numId` of the ordered block in progress, if any.
    current_ordered: Option<u32>,
    used_styles: Vec<StyleId>,
    /// Separator image to package, if any separator drew one.
    media: Option<SeparatorImage>,
    /// Drawings written so far; numbers `docPr` ids.
    drawings: u32,
}

impl<'a> BodyWriter<'a> {
    fn new(reference: &'a ReferenceStyleSet) -> Self {
        Self {
            reference,
            body: String::new(),
            diagnostics: Vec::new(),
            used_bullets: false,
            ordered_blocks: 0,
            current_ordered: None,
            used_styles: Vec::new(),
            media: None,
            drawings: 0,
        }
    }

    fn element(&mut self, index: usize, e: &Element) {
        if !matches!(e.kind, ElementKind::ListItem { .. }) {
            self.current_ordered = None;
        }
        match &e.kind {
            ElementKind::PageBreak => {
                self.body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
            }
            ElementKind::Heading { .. } if !is_heading_style(e.style) => {
                self.downgrade(index, e, format!("heading style {} is outside Heading 1-{MAX_HEADING_LEVEL}", e.style));
            }
            ElementKind::ListItem { level, .. } if *level > MAX_LIST_LEVEL => {
                self.current_ordered = None;
                self.downgrade(index, e, format!("list level {level} exceeds {MAX_LIST_LEVEL}"));
            }
            ElementKind::ListItem { kind, level } => {
                let num_id = match kind {
                    ListKind::Unordered => {
                        self.used_bullets = true;
                        BULLET_NUM_ID
                    }
                    ListKind::Ordered => match self.current_ordered {
                        Some(id) => id,
                        None => {
                            self.ordered_blocks += 1;
                            let id = BULLET_NUM_ID + self.ordered_blocks;
                            self.current_ordered = Some(id);
                            id
                        }
                    },
                };
                self.paragraph(index, e, e.style, &e.direct, Some((*level, num_id)));
            }
            ElementKind::Table { rows } if rows.iter().all(|r| r.is_empty()) => {
                self.downgrade(index, e, "table has no cells".to_string());
            }
            ElementKind::Table { rows } => self.table(index, e, rows),
            ElementKind::Separator { image: Some(image) } => self.image_paragraph(e, image),
            ElementKind::Heading { .. }
            | ElementKind::Paragraph
            | ElementKind::Quote
            | ElementKind::Separator { image: None } => {
                self.paragraph(index, e, e.style, &e.direct, None);
            }
        }
    }

    /// Write `e` as a body paragraph with its text, and report why.
    fn downgrade(&mut self, index: usize, e: &Element, reason: String) {
        let d = Diagnostic::SerializationError {
            element: index,
            detail: format!("{reason}; written as a plain paragraph"),
        };
        warn!("{d}");
        self.diagnostics.push(d);
        let plain = Element {
            kind: ElementKind::Paragraph,
            style: StyleId::Body,
            effective: StyleProperties::default(),
            direct: StyleProperties::default(),
            runs: vec![StyledRun {
                text: e.text(),
                props: StyleProperties::default(),
            }],
            page_break_before: e.page_break_before,
        };
        self.paragraph(index, &plain, StyleId::Body, &StyleProperties::default(), None);
    }

    fn paragraph(
        &mut self,
        index: usize,
        e: &Element,
        style: StyleId,
        direct: &StyleProperties,
        numbering: Option<(u8, u32)>,
    ) {
        self.use_style(style);
        let mut xml = String::from("<w:p><w:pPr>");
        let _ = write!(xml, r#"<w:pStyle w:val="{}"/>"#, escape_xml(&self.reference.docx_id(style)));
        if e.page_break_before {
            xml.push_str("<w:pageBreakBefore/>");
        }
        if let Some((level, num_id)) = numbering {
            let _ = write!(
                xml,
                r#"<w:numPr><w:ilvl w:val="{level}"/><w:numId w:val="{num_id}"/></w:numPr>"#
            );
        }
        xml.push_str(&paragraph_properties(direct));
        xml.push_str("</w:pPr>");

        let base = direct.character_only();
        let mut removed = 0;
        for run in &e.runs {
            let props = run.props.layered_over(&base);
            removed += push_run(&mut xml, &run.text, &props);
        }
        xml.push_str("</w:p>");
        self.body.push_str(&xml);
        self.report_illegal(index, removed);
    }

    /// A paragraph holding one inline picture. Every image separator shares
    /// the first image's media part.
    fn image_paragraph(&mut self, e: &Element, image: &SeparatorImage) {
        self.use_style(e.style);
        if self.media.is_none() {
            self.media = Some(image.clone());
        }
        self.drawings += 1;
        let id = self.drawings;
        let (cx, cy) = (image.width_emu, image.height_emu);

        let mut xml = String::from("<w:p><w:pPr>");
        let _ = write!(xml, r#"<w:pStyle w:val="{}"/>"#, escape_xml(&self.reference.docx_id(e.style)));
        if e.page_break_before {
            xml.push_str("<w:pageBreakBefore/>");
        }
        xml.push_str(&paragraph_properties(&e.direct));
        let _ = write!(
            xml,
            r#"</w:pPr><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Separator {id}"/><a:graphic xmlns:a="{A_NS}"><a:graphicData uri="{PIC_NS}"><pic:pic xmlns:pic="{PIC_NS}"><pic:nvPicPr><pic:cNvPr id="{id}" name="{SEPARATOR_MEDIA}.{ext}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{SEPARATOR_REL_ID}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
            ext = escape_xml(&image.extension),
        );
        self.body.push_str(&xml);
    }

    fn table(&mut self, index: usize, e: &Element, rows: &[Vec<String>]) {
        self.use_style(StyleId::Body);
        let cols = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let page = self.reference.page_setup();
        let text_width = page.width.saturating_sub(page.margin_left + page.margin_right);
        let col_width = text_width / cols as u32;
        let body_id = escape_xml(&self.reference.docx_id(StyleId::Body));
        let base = e.direct.character_only();

        let mut xml = String::from("<w:tbl><w:tblPr>");
        xml.push_str(r#"<w:tblW w:w="0" w:type="auto"/><w:tblBorders>"#);
        for side in ["top", "left", "bottom", "right", "insideH", "insideV"] {
            let _ = write!(xml, r#"<w:{side} w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#);
        }
        xml.push_str("</w:tblBorders></w:tblPr><w:tblGrid>");
        for _ in 0..cols {
            let _ = write!(xml, r#"<w:gridCol w:w="{col_width}"/>"#);
        }
        xml.push_str("</w:tblGrid>");

        let mut removed = 0;
        for row in rows {
            xml.push_str("<w:tr>");
            for c in 0..cols {
                let cell = row.get(c).map(String::as_str).unwrap_or("");
                let _ = write!(
                    xml,
                    r#"<w:tc><w:tcPr><w:tcW w:w="{col_width}" w:type="dxa"/></w:tcPr><w:p><w:pPr><w:pStyle w:val="{body_id}"/></w:pPr>"#
                );
                removed += push_run(&mut xml, cell, &base);
                xml.push_str("</w:p></w:tc>");
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");
        if e.page_break_before {
            self.body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        }
        self.body.push_str(&xml);
        self.report_illegal(index, removed);
    }

    fn report_illegal(&mut self, index: usize, removed: usize) {
        if removed == 0 {
            return;
        }
        let d = Diagnostic::SerializationError {
            element: index,
            detail: format!("removed {removed} character(s) that XML cannot represent"),
        };
        warn!("{d}");
        self.diagnostics.push(d);
    }

    fn use_style(&mut self, id: StyleId) {
        if !self.used_styles.contains(&id) {
            self.used_styles.push(id);
        }
    }
}

/// Append one `w:r` (split at `\n` into line breaks). Returns the number of
/// characters dropped as illegal.
fn push_run(xml: &mut String, text: &str, props: &StyleProperties) -> usize {
    let (text, removed) = strip_illegal(text);
    if text.is_empty() {
        return removed;
    }
    xml.push_str("<w:r>");
    let rpr = run_properties(props);
    if !rpr.is_empty() {
        let _ = write!(xml, "<w:rPr>{rpr}</w:rPr>");
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            xml.push_str("<w:br/>");
        }
        if !line.is_empty() {
            let _ = write!(xml, r#"<w:t xml:space="preserve">{}</w:t>"#, escape_xml(line));
        }
    }
    xml.push_str("</w:r>");
    removed
}

// ── Property serialisation ───────────────────────────────────────────────

fn twips(pt: f32) -> i64 {
    (pt * 20.0).round() as i64
}

/// Paragraph-level properties (`w:spacing`, `w:ind`, `w:jc`), schema order.
fn paragraph_properties(p: &StyleProperties) -> String {
    let mut xml = String::new();
    if p.space_before_pt.is_some() || p.space_after_pt.is_some() || p.line_spacing.is_some() {
        xml.push_str("<w:spacing");
        if let Some(b) = p.space_before_pt {
            let _ = write!(xml, r#" w:before="{}""#, twips(b));
        }
        if let Some(a) = p.space_after_pt {
            let _ = write!(xml, r#" w:after="{}""#, twips(a));
        }
        if let Some(l) = p.line_spacing {
            let _ = write!(xml, r#" w:line="{}" w:lineRule="auto""#, (l * 240.0).round() as i64);
        }
        xml.push_str("/>");
    }
    if p.indent_left_pt.is_some() || p.indent_first_line_pt.is_some() {
        xml.push_str("<w:ind");
        if let Some(left) = p.indent_left_pt {
            let _ = write!(xml, r#" w:left="{}""#, twips(left));
        }
        match p.indent_first_line_pt {
            Some(f) if f < 0.0 => {
                let _ = write!(xml, r#" w:hanging="{}""#, twips(-f));
            }
            Some(f) => {
                let _ = write!(xml, r#" w:firstLine="{}""#, twips(f));
            }
            None => {}
        }
        xml.push_str("/>");
    }
    if let Some(a) = p.alignment {
        let _ = write!(xml, r#"<w:jc w:val="{}"/>"#, a.docx_value());
    }
    xml
}

/// Character-level properties (`w:rFonts`, `w:b`, `w:i`, `w:color`, `w:sz`).
fn run_properties(p: &StyleProperties) -> String {
    let mut xml = String::new();
    if let Some(ref font) = p.font_family {
        let f = escape_xml(font);
        let _ = write!(xml, r#"<w:rFonts w:ascii="{f}" w:hAnsi="{f}" w:cs="{f}" w:eastAsia="{f}"/>"#);
    }
    match p.bold {
        Some(true) => xml.push_str("<w:b/>"),
        Some(false) => xml.push_str(r#"<w:b w:val="0"/>"#),
        None => {}
    }
    match p.italic {
        Some(true) => xml.push_str("<w:i/>"),
        Some(false) => xml.push_str(r#"<w:i w:val="0"/>"#),
        None => {}
    }
    if let Some(ref color) = p.color {
        let hex = color.trim_start_matches('#');
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            let _ = write!(xml, r#"<w:color w:val="{}"/>"#, hex.to_ascii_uppercase());
        }
    }
    if let Some(size) = p.font_size_pt {
        let half = (size * 2.0).round().max(1.0) as u32;
        let _ = write!(xml, r#"<w:sz w:val="{half}"/><w:szCs w:val="{half}"/>"#);
    }
    xml
}

// ── Parts ────────────────────────────────────────────────────────────────

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

fn document_xml(body: &str, reference: &ReferenceStyleSet) -> String {
    let p = reference.page_setup();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}" xmlns:wp="{WP_NS}">
  <w:body>{body}<w:sectPr><w:pgSz w:w="{}" w:h="{}"/><w:pgMar w:top="{}" w:right="{}" w:bottom="{}" w:left="{}" w:header="708" w:footer="708" w:gutter="0"/><w:cols w:space="708"/></w:sectPr></w:body>
</w:document>"#,
        p.width, p.height, p.margin_top, p.margin_right, p.margin_bottom, p.margin_left
    )
}

/// The reference's styles part, plus definitions for used styles it lacks;
/// or a complete generated part when the reference came from memory.
fn styles_xml(reference: &ReferenceStyleSet, used: &[StyleId]) -> String {
    if let Some(original) = reference.styles_xml() {
        let missing: String = used
            .iter()
            .filter(|id| {
                let docx_id = reference.docx_id(**id);
                !original.contains(&format!(r#"w:styleId="{docx_id}""#))
            })
            .map(|id| style_definition(reference, *id))
            .collect();
        if missing.is_empty() {
            return original.to_string();
        }
        if let Some(end) = original.rfind("</w:styles>") {
            let mut xml = original.to_string();
            xml.insert_str(end, &missing);
            return xml;
        }
        return original.to_string();
    }

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{W_NS}">"#
    );
    for id in StyleId::all() {
        xml.push_str(&style_definition(reference, id));
    }
    xml.push_str("</w:styles>");
    xml
}

fn style_definition(reference: &ReferenceStyleSet, id: StyleId) -> String {
    let props = reference.resolve(id);
    let docx_id = escape_xml(&reference.docx_id(id));
    let mut xml = String::new();
    if id == StyleId::Body {
        let _ = write!(
            xml,
            r#"<w:style w:type="paragraph" w:default="1" w:styleId="{docx_id}"><w:name w:val="Normal"/><w:qFormat/>"#
        );
    } else {
        let normal = escape_xml(&reference.docx_id(StyleId::Body));
        let _ = write!(
            xml,
            r#"<w:style w:type="paragraph" w:styleId="{docx_id}"><w:name w:val="{}"/><w:basedOn w:val="{normal}"/><w:next w:val="{normal}"/><w:qFormat/>"#,
            escape_xml(&id.default_docx_name())
        );
    }
    let mut ppr = paragraph_properties(&props);
    if let StyleId::Heading(n) = id {
        let _ = write!(ppr, r#"<w:keepNext/><w:outlineLvl w:val="{}"/>"#, n.saturating_sub(1));
    }
    if !ppr.is_empty() {
        let _ = write!(xml, "<w:pPr>{ppr}</w:pPr>");
    }
    let rpr = run_properties(&props);
    if !rpr.is_empty() {
        let _ = write!(xml, "<w:rPr>{rpr}</w:rPr>");
    }
    xml.push_str("</w:style>");
    xml
}

fn numbering_xml(ordered_blocks: u32) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="{W_NS}">"#
    );
    let bullets = ["•", "◦", "▪"];
    let _ = write!(xml, r#"<w:abstractNum w:abstractNumId="{BULLET_ABSTRACT_ID}"><w:multiLevelType w:val="hybridMultilevel"/>"#);
    for level in 0..=MAX_LIST_LEVEL {
        let symbol = bullets[level as usize % bullets.len()];
        xml.push_str(&list_level(level, "bullet", symbol));
    }
    xml.push_str("</w:abstractNum>");
    let _ = write!(xml, r#"<w:abstractNum w:abstractNumId="{DECIMAL_ABSTRACT_ID}"><w:multiLevelType w:val="hybridMultilevel"/>"#);
    for level in 0..=MAX_LIST_LEVEL {
        let text = format!("%{}.", level + 1);
        xml.push_str(&list_level(level, "decimal", &text));
    }
    xml.push_str("</w:abstractNum>");

    let _ = write!(
        xml,
        r#"<w:num w:numId="{BULLET_NUM_ID}"><w:abstractNumId w:val="{BULLET_ABSTRACT_ID}"/></w:num>"#
    );
    for block in 1..=ordered_blocks {
        let _ = write!(
            xml,
            r#"<w:num w:numId="{}"><w:abstractNumId w:val="{DECIMAL_ABSTRACT_ID}"/><w:lvlOverride w:ilvl="0"><w:startOverride w:val="1"/></w:lvlOverride></w:num>"#,
            BULLET_NUM_ID + block
        );
    }
    xml.push_str("</w:numbering>");
    xml
}

fn is_heading_style(style: StyleId) -> bool {
    match style {
        StyleId::Title | StyleId::TocHeading => true,
        StyleId::Heading(n) => (1..=MAX_HEADING_LEVEL).contains(&n),
        _ => false,
    }
}

fn list_level(level: u8, format: &str, text: &str) -> String {
    let left = 720 * (u32::from(level) + 1);
    format!(
        r#"<w:lvl w:ilvl="{level}"><w:start w:val="1"/><w:numFmt w:val="{format}"/><w:lvlText w:val="{}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="{left}" w:hanging="360"/></w:pPr></w:lvl>"#,
        escape_xml(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Alignment;

    fn el(kind: ElementKind, style: StyleId, text: &str) -> Element {
        Element {
            kind,
            style,
            effective: StyleProperties::default(),
            direct: StyleProperties::default(),
            runs: vec![StyledRun {
                text: text.into(),
                props: StyleProperties::default(),
            }],
            page_break_before: false,
        }
    }

    fn reference() -> ReferenceStyleSet {
        ReferenceStyleSet::new([(StyleId::Body, StyleProperties::default())])
    }

    #[test]
    fn paragraphs_reference_style_ids() {
        let els = vec![
            el(ElementKind::Heading { level: 1 }, StyleId::Heading(1), "Chapter 1"),
            el(ElementKind::Paragraph, StyleId::Body, "Hello & bye"),
        ];
        let (doc, diags) = assemble(&els, &reference());
        assert!(diags.is_empty());
        let xml = doc.document_xml();
        assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(xml.contains(r#"<w:pStyle w:val="Normal"/>"#));
        assert!(xml.contains("Hello &amp; bye"));
        assert!(xml.contains(r#"<w:pgSz w:w="12240" w:h="15840"/>"#));
        assert!(doc.numbering_xml().is_none());
    }

    #[test]
    fn direct_formatting_is_written() {
        let mut e = el(ElementKind::Quote, StyleId::Quote, "line one\nline two");
        e.direct = StyleProperties {
            alignment: Some(Alignment::Center),
            italic: Some(true),
            line_spacing: Some(1.0),
            ..Default::default()
        };
        let (doc, _) = assemble(&[e], &reference());
        let xml = doc.document_xml();
        assert!(xml.contains(r#"<w:jc w:val="center"/>"#));
        assert!(xml.contains(r#"<w:spacing w:line="240" w:lineRule="auto"/>"#));
        assert!(xml.contains("<w:i/>"));
        assert!(xml.contains("<w:br/>"));
    }

    #[test]
    fn ordered_lists_restart_per_block() {
        let item = |level| el(ElementKind::ListItem { kind: ListKind::Ordered, level }, StyleId::ListNumber, "x");
        let els = vec![
            item(0),
            item(1),
            el(ElementKind::Paragraph, StyleId::Body, "between"),
            item(0),
        ];
        let (doc, _) = assemble(&els, &reference());
        let xml = doc.document_xml();
        assert_eq!(xml.matches(r#"<w:numId w:val="2"/>"#).count(), 2);
        assert_eq!(xml.matches(r#"<w:numId w:val="3"/>"#).count(), 1);
        let numbering = doc.numbering_xml().unwrap();
        assert_eq!(numbering.matches("<w:startOverride").count(), 2);
        assert_eq!(numbering.matches("<w:lvl ").count(), 18);
    }

    #[test]
    fn unrepresentable_elements_are_downgraded() {
        let els = vec![
            el(ElementKind::ListItem { kind: ListKind::Unordered, level: 12 }, StyleId::ListBullet, "deep"),
            el(ElementKind::Heading { level: 11 }, StyleId::Heading(11), "tiny"),
            el(ElementKind::Table { rows: vec![] }, StyleId::Body, ""),
        ];
        let (doc, diags) = assemble(&els, &reference());
        assert_eq!(diags.len(), 3);
        assert!(diags
            .iter()
            .all(|d| matches!(d, Diagnostic::SerializationError { .. })));
        assert!(doc.document_xml().contains(">deep<"));
        assert!(!doc.document_xml().contains("<w:numPr>"));
    }

    #[test]
    fn heading_representability_follows_the_style() {
        let els = vec![
            el(ElementKind::Heading { level: 12 }, StyleId::Heading(6), "clamped"),
            el(ElementKind::Heading { level: 1 }, StyleId::Title, "The Long Road"),
            el(ElementKind::Heading { level: 2 }, StyleId::Body, "odd"),
        ];
        let (doc, diags) = assemble(&els, &reference());
        let xml = doc.document_xml();
        assert!(xml.contains(r#"<w:pStyle w:val="Heading6"/>"#));
        assert!(xml.contains(r#"<w:pStyle w:val="Title"/>"#));
        assert!(matches!(
            diags[..],
            [Diagnostic::SerializationError { element: 2, .. }]
        ));
    }

    #[test]
    fn image_separators_share_one_media_part() {
        let image = SeparatorImage {
            bytes: vec![7, 7, 7].into(),
            extension: "png".into(),
            width_emu: 914_400,
            height_emu: 457_200,
        };
        let separator = || {
            let mut e = el(ElementKind::Separator { image: Some(image.clone()) }, StyleId::Body, "");
            e.runs.clear();
            e
        };
        let els = vec![
            el(ElementKind::Heading { level: 1 }, StyleId::Heading(1), "Chapter 1"),
            separator(),
            el(ElementKind::Heading { level: 1 }, StyleId::Heading(1), "Chapter 2"),
            separator(),
        ];
        let (doc, diags) = assemble(&els, &reference());
        assert!(diags.is_empty());
        let xml = doc.document_xml();
        assert_eq!(xml.matches(r#"<a:blip r:embed="rId3"/>"#).count(), 2);
        assert!(xml.contains(r#"<wp:extent cx="914400" cy="457200"/>"#));
        assert!(xml.contains(r#"<wp:docPr id="2" name="Separator 2"/>"#));
        assert_eq!(doc.separator_image(), Some(&image));
        assert!(doc.part_names().contains(&"word/media/separator.png".to_string()));
    }

    #[test]
    fn text_separators_package_no_media() {
        let els = vec![el(ElementKind::Separator { image: None }, StyleId::Body, "❦")];
        let (doc, _) = assemble(&els, &reference());
        assert!(doc.document_xml().contains(">❦<"));
        assert!(doc.separator_image().is_none());
        assert!(!doc.document_xml().contains("<w:drawing>"));
    }

    #[test]
    fn illegal_characters_are_removed_with_a_diagnostic() {
        let els = vec![el(ElementKind::Paragraph, StyleId::Body, "bad\u{1}char")];
        let (doc, diags) = assemble(&els, &reference());
        assert!(doc.document_xml().contains(">badchar<"));
        assert!(matches!(
            diags[..],
            [Diagnostic::SerializationError { element: 0, .. }]
        ));
    }

    #[test]
    fn tables_have_borders_and_padding() {
        let rows = vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string(), String::new()]];
        let mut e = el(ElementKind::Table { rows }, StyleId::Body, "");
        e.runs.clear();
        let (doc, diags) = assemble(&[e], &reference());
        assert!(diags.is_empty());
        let xml = doc.document_xml();
        assert_eq!(xml.matches("<w:tc>").count(), 4);
        assert!(xml.contains("<w:insideH "));
    }

    #[test]
    fn reference_styles_part_is_reused_and_extended() {
        let original = format!(
            r#"<w:styles xmlns:w="{W_NS}"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style></w:styles>"#
        );
        let reference = ReferenceStyleSet::from_parts(
            [(StyleId::Body, StyleProperties::default())].into_iter().collect(),
            [(StyleId::Body, "Normal".to_string())].into_iter().collect(),
            Default::default(),
            Some(original.clone().into()),
        );
        let (doc, _) = assemble(&[el(ElementKind::Paragraph, StyleId::Body, "x")], &reference);
        assert_eq!(doc.styles_xml(), original);

        let els = vec![el(ElementKind::Quote, StyleId::Quote, "q")];
        let (doc, _) = assemble(&els, &reference);
        assert!(doc.styles_xml().starts_with(r#"<w:styles"#));
        assert!(doc.styles_xml().contains(r#"w:styleId="Quote""#));
    }

    #[test]
    fn generated_styles_cover_every_identifier() {
        let (doc, _) = assemble(&[], &reference());
        for id in StyleId::all() {
            assert!(
                doc.styles_xml().contains(&format!(r#"w:styleId="{}""#, id.default_docx_id())),
                "missing {id}"
            );
        }
    }
}
