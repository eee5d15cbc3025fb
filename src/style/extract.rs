//! Style model extraction from a reference Word package.
//!
//! Reads `word/styles.xml` (document defaults plus every paragraph style,
//! with `w:basedOn` chains resolved) and the page setup from the body's
//! `w:sectPr` in `word/document.xml`. Nothing in the package is modified.

use super::{Alignment, PageSetup, ReferenceStyleSet, StyleId, StyleProperties};
use crate::docx::xml::{attr, local_name, open_archive, read_part, toggle};
use crate::error::Text2DocxError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const STYLES_XML_PATH: &str = "word/styles.xml";
const DOCUMENT_XML_PATH: &str = "word/document.xml";

/// Build a [`ReferenceStyleSet`] from a `.docx`/`.dotx` file.
///
/// # Errors
/// [`Text2DocxError::ReferenceUnreadable`] when the file cannot be read, is
/// not a Word package, lacks `word/styles.xml`, contains malformed XML, or
/// defines no recognisable paragraph style.
pub fn extract_style_model(path: &Path) -> Result<ReferenceStyleSet, Text2DocxError> {
    let bytes = std::fs::read(path).map_err(|e| Text2DocxError::reference(Some(path), e.to_string()))?;
    parse_package(&bytes).map_err(|detail| Text2DocxError::reference(Some(path), detail))
}

impl ReferenceStyleSet {
    /// Build a style set from an in-memory Word package.
    pub fn from_docx_bytes(bytes: &[u8]) -> Result<Self, Text2DocxError> {
        parse_package(bytes).map_err(|detail| Text2DocxError::reference(None, detail))
    }
}

fn parse_package(bytes: &[u8]) -> Result<ReferenceStyleSet, String> {
    let mut archive = open_archive(bytes)?;
    let styles_xml = read_part(&mut archive, STYLES_XML_PATH)?
        .ok_or_else(|| format!("package has no {STYLES_XML_PATH}"))?;
    let page = match read_part(&mut archive, DOCUMENT_XML_PATH)? {
        Some(doc) => parse_page_setup(&doc)?,
        None => PageSetup::default(),
    };

    let raw = parse_styles_xml(&styles_xml)?;
    let (styles, docx_ids) = resolve_styles(&raw);
    if styles.is_empty() {
        return Err("no usable paragraph style definitions found".to_string());
    }
    debug!(
        "Reference defines {} style(s): {}",
        styles.len(),
        styles.keys().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
    );
    Ok(ReferenceStyleSet::from_parts(
        styles,
        docx_ids,
        page,
        Some(Arc::from(styles_xml)),
    ))
}

// ── styles.xml ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RawStyle {
    style_id: String,
    name: Option<String>,
    based_on: Option<String>,
    is_default: bool,
    props: StyleProperties,
}

#[derive(Debug, Default)]
struct RawStyles {
    defaults: StyleProperties,
    paragraph: Vec<RawStyle>,
}

enum Target {
    None,
    Defaults,
    Style(RawStyle),
    /// Inside a non-paragraph style (character, table, numbering).
    Skipped,
}

fn parse_styles_xml(xml: &str) -> Result<RawStyles, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = RawStyles::default();
    let mut target = Target::None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed {STYLES_XML_PATH}: {e}"))?;
        match event {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"docDefaults" => target = Target::Defaults,
                    b"style" => {
                        target = if attr(&e, b"type").as_deref() == Some("paragraph") {
                            Target::Style(RawStyle {
                                style_id: attr(&e, b"styleId").unwrap_or_default(),
                                is_default: attr(&e, b"default").as_deref() == Some("1"),
                                ..RawStyle::default()
                            })
                        } else {
                            Target::Skipped
                        };
                    }
                    other => apply_element(&mut target, &mut out.defaults, other, &e),
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                apply_element(&mut target, &mut out.defaults, local_name(name.as_ref()), &e);
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"docDefaults" => target = Target::None,
                    b"style" => {
                        if let Target::Style(style) = std::mem::replace(&mut target, Target::None) {
                            out.paragraph.push(style);
                        }
                        target = Target::None;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

fn apply_element(
    target: &mut Target,
    defaults: &mut StyleProperties,
    local: &[u8],
    e: &BytesStart<'_>,
) {
    match target {
        Target::Style(style) => match local {
            b"name" => style.name = attr(e, b"val"),
            b"basedOn" => style.based_on = attr(e, b"val"),
            _ => apply_property(&mut style.props, local, e),
        },
        Target::Defaults => apply_property(defaults, local, e),
        Target::None | Target::Skipped => {}
    }
}

/// Read one `w:pPr`/`w:rPr` child into `props`.
fn apply_property(props: &mut StyleProperties, local: &[u8], e: &BytesStart<'_>) {
    let twips_to_pt = |v: String| v.parse::<f32>().ok().map(|t| t / 20.0);
    match local {
        b"rFonts" => {
            if let Some(font) = attr(e, b"ascii").or_else(|| attr(e, b"hAnsi")) {
                props.font_family = Some(font);
            }
        }
        b"sz" => {
            if let Some(half) = attr(e, b"val").and_then(|v| v.parse::<f32>().ok()) {
                props.font_size_pt = Some(half / 2.0);
            }
        }
        b"b" => props.bold = Some(toggle(e)),
        b"i" => props.italic = Some(toggle(e)),
        b"color" => {
            if let Some(c) = attr(e, b"val").filter(|c| c != "auto") {
                props.color = Some(c.to_ascii_uppercase());
            }
        }
        b"jc" => {
            if let Some(a) = attr(e, b"val").as_deref().and_then(Alignment::from_docx) {
                props.alignment = Some(a);
            }
        }
        b"spacing" => {
            if let Some(v) = attr(e, b"before").and_then(twips_to_pt) {
                props.space_before_pt = Some(v);
            }
            if let Some(v) = attr(e, b"after").and_then(twips_to_pt) {
                props.space_after_pt = Some(v);
            }
            let rule = attr(e, b"lineRule");
            if matches!(rule.as_deref(), None | Some("auto")) {
                if let Some(line) = attr(e, b"line").and_then(|v| v.parse::<f32>().ok()) {
                    props.line_spacing = Some(line / 240.0);
                }
            }
        }
        b"ind" => {
            if let Some(v) = attr(e, b"left").or_else(|| attr(e, b"start")).and_then(twips_to_pt) {
                props.indent_left_pt = Some(v);
            }
            if let Some(v) = attr(e, b"firstLine").and_then(twips_to_pt) {
                props.indent_first_line_pt = Some(v);
            } else if let Some(v) = attr(e, b"hanging").and_then(twips_to_pt) {
                props.indent_first_line_pt = Some(-v);
            }
        }
        _ => {}
    }
}

/// Flatten `basedOn` chains and map Word styles to identifiers.
fn resolve_styles(
    raw: &RawStyles,
) -> (BTreeMap<StyleId, StyleProperties>, BTreeMap<StyleId, String>) {
    let by_id: HashMap<&str, &RawStyle> = raw
        .paragraph
        .iter()
        .map(|s| (s.style_id.as_str(), s))
        .collect();

    let mut styles = BTreeMap::new();
    let mut docx_ids = BTreeMap::new();
    for style in &raw.paragraph {
        let id = style
            .name
            .as_deref()
            .and_then(StyleId::from_docx_name)
            .or_else(|| style.is_default.then_some(StyleId::Body));
        let Some(id) = id else { continue };
        // "Intense Quote" only stands in when plain "Quote" is absent.
        let secondary = style
            .name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case("intense quote"));
        if secondary && styles.contains_key(&id) {
            continue;
        }
        let props = effective(style, &by_id, &raw.defaults);
        styles.insert(id, props);
        docx_ids.insert(id, style.style_id.clone());
    }
    (styles, docx_ids)
}

fn effective(
    style: &RawStyle,
    by_id: &HashMap<&str, &RawStyle>,
    defaults: &StyleProperties,
) -> StyleProperties {
    let mut chain = vec![style];
    let mut current = style;
    while let Some(parent) = current.based_on.as_deref().and_then(|p| by_id.get(p)) {
        if chain.iter().any(|s| s.style_id == parent.style_id) || chain.len() > 32 {
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain
        .iter()
        .rev()
        .fold(defaults.clone(), |acc, s| s.props.layered_over(&acc))
}

// ── document.xml ─────────────────────────────────────────────────────────

fn parse_page_setup(xml: &str) -> Result<PageSetup, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut page = PageSetup::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed {DOCUMENT_XML_PATH}: {e}"))?;
        match event {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"pgSz" => {
                        if let Some(w) = attr(&e, b"w").and_then(|v| v.parse().ok()) {
                            page.width = w;
                        }
                        if let Some(h) = attr(&e, b"h").and_then(|v| v.parse().ok()) {
                            page.height = h;
                        }
                    }
                    b"pgMar" => {
                        if let Some(v) = attr(&e, b"top").and_then(|v| v.parse().ok()) {
                            page.margin_top = v;
                        }
                        if let Some(v) = attr(&e, b"right").and_then(|v| v.parse().ok()) {
                            page.margin_right = v;
                        }
                        if let Some(v) = attr(&e, b"bottom").and_then(|v| v.parse().ok()) {
                            page.margin_bottom = v;
                        }
                        if let Some(v) = attr(&e, b"left").and_then(|v| v.parse().ok()) {
                            page.margin_left = v;
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault><w:rPr><w:rFonts w:ascii="Cambria" w:hAnsi="Cambria"/><w:sz w:val="22"/></w:rPr></w:rPrDefault>
    <w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr></w:pPrDefault>
  </w:docDefaults>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:rPr><w:sz w:val="24"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading1">
    <w:name w:val="heading 1"/>
    <w:basedOn w:val="Normal"/>
    <w:pPr><w:jc w:val="center"/><w:spacing w:before="480"/></w:pPr>
    <w:rPr><w:b/><w:sz w:val="32"/><w:color w:val="2f5496"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="IntenseQuote">
    <w:name w:val="Intense Quote"/>
    <w:basedOn w:val="Normal"/>
    <w:rPr><w:i/></w:rPr>
  </w:style>
  <w:style w:type="character" w:styleId="Strong">
    <w:name w:val="Strong"/>
    <w:rPr><w:b/></w:rPr>
  </w:style>
</w:styles>"#;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body><w:p/><w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1417" w:right="1134" w:bottom="1134" w:left="1134"/></w:sectPr></w:body>
</w:document>"#;

    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let opt = SimpleFileOptions::default();
        for (name, body) in parts {
            zip.start_file(*name, opt).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_resolved_properties() {
        let set = ReferenceStyleSet::from_docx_bytes(&package(&[
            (STYLES_XML_PATH, STYLES),
            (DOCUMENT_XML_PATH, DOCUMENT),
        ]))
        .unwrap();

        let body = set.get(StyleId::Body).unwrap();
        assert_eq!(body.font_size_pt, Some(12.0));
        assert_eq!(body.font_family.as_deref(), Some("Cambria"));
        assert_eq!(body.space_after_pt, Some(8.0));

        let h1 = set.get(StyleId::Heading(1)).unwrap();
        assert_eq!(h1.font_size_pt, Some(16.0));
        assert_eq!(h1.alignment, Some(Alignment::Center));
        assert_eq!(h1.bold, Some(true));
        assert_eq!(h1.color.as_deref(), Some("2F5496"));
        // Inherited through basedOn -> Normal -> docDefaults.
        assert_eq!(h1.font_family.as_deref(), Some("Cambria"));

        assert_eq!(set.get(StyleId::Quote).unwrap().italic, Some(true));
        assert_eq!(set.docx_id(StyleId::Quote), "IntenseQuote");
        assert_eq!(set.docx_id(StyleId::Heading(1)), "Heading1");
        assert_eq!(set.page_setup().width, 11906);
        assert_eq!(set.page_setup().margin_top, 1417);
        assert!(set.styles_xml().is_some());
    }

    #[test]
    fn missing_document_part_uses_default_page() {
        let set =
            ReferenceStyleSet::from_docx_bytes(&package(&[(STYLES_XML_PATH, STYLES)])).unwrap();
        assert_eq!(*set.page_setup(), PageSetup::default());
    }

    #[test]
    fn non_zip_is_unreadable() {
        let err = ReferenceStyleSet::from_docx_bytes(b"plain text, not a package").unwrap_err();
        assert!(matches!(err, Text2DocxError::ReferenceUnreadable { .. }));
    }

    #[test]
    fn missing_styles_part_is_unreadable() {
        let err = ReferenceStyleSet::from_docx_bytes(&package(&[(DOCUMENT_XML_PATH, DOCUMENT)]))
            .unwrap_err();
        assert!(err.to_string().contains("styles.xml"), "got: {err}");
    }

    #[test]
    fn malformed_styles_xml_is_unreadable() {
        let err = ReferenceStyleSet::from_docx_bytes(&package(&[(
            STYLES_XML_PATH,
            "<w:styles><w:style></w:styles>",
        )]))
        .unwrap_err();
        assert!(matches!(err, Text2DocxError::ReferenceUnreadable { .. }));
    }

    #[test]
    fn no_recognised_styles_is_unreadable() {
        let only_custom = r#"<w:styles xmlns:w="x"><w:style w:type="paragraph" w:styleId="Fancy"><w:name w:val="Fancy"/></w:style></w:styles>"#;
        let err = ReferenceStyleSet::from_docx_bytes(&package(&[(STYLES_XML_PATH, only_custom)]))
            .unwrap_err();
        assert!(err.to_string().contains("no usable"), "got: {err}");
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = extract_style_model(Path::new("/no/such/reference.docx")).unwrap_err();
        assert!(matches!(err, Text2DocxError::ReferenceUnreadable { path: Some(_), .. }));
    }
}
