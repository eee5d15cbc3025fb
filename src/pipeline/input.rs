//! Input readers: turn a source file into text for the pipeline.
//!
//! | Extension | Reader | Oracle |
//! |-----------|--------|--------|
//! | `.txt`, anything unknown | UTF-8 text (lossy) | yes |
//! | `.md`, `.markdown` | UTF-8 text | bypassed |
//! | `.rtf` | control words stripped to plain text | yes |
//! | `.docx` | paragraph styles rewritten as markup | bypassed when styled |

use crate::docx::xml::{attr, local_name, open_archive, read_part, resolve_entity, strip_bom, toggle};
use crate::error::Text2DocxError;
use crate::structure::markup::{escape_inline, escape_line};
use crate::style::StyleId;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source format, from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    PlainText,
    Markup,
    Rtf,
    Docx,
}

impl InputFormat {
    /// Unknown or missing extensions are plain text.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("md" | "markdown") => InputFormat::Markup,
            Some("rtf") => InputFormat::Rtf,
            Some("docx" | "docm") => InputFormat::Docx,
            _ => InputFormat::PlainText,
        }
    }
}

/// Text read from an input file.
#[derive(Debug, Clone)]
pub struct InputText {
    pub text: String,
    pub format: InputFormat,
    /// The text is already markup; structuring is skipped.
    pub is_markup: bool,
}

/// Read `path` according to its extension.
///
/// # Errors
/// [`Text2DocxError::FileNotFound`], [`Text2DocxError::PermissionDenied`],
/// or [`Text2DocxError::InputUnreadable`] when the content cannot be decoded.
pub fn read_input(path: &Path) -> Result<InputText, Text2DocxError> {
    let bytes = read_bytes(path)?;
    let format = InputFormat::from_path(path);
    let unreadable = |detail: String| Text2DocxError::InputUnreadable {
        path: path.to_path_buf(),
        detail,
    };

    let input = match format {
        InputFormat::PlainText => InputText {
            text: String::from_utf8_lossy(strip_bom(&bytes)).into_owned(),
            format,
            is_markup: false,
        },
        InputFormat::Markup => InputText {
            text: String::from_utf8_lossy(strip_bom(&bytes)).into_owned(),
            format,
            is_markup: true,
        },
        InputFormat::Rtf => {
            let raw = String::from_utf8_lossy(&bytes);
            if !raw.trim_start().starts_with("{\\rtf") {
                return Err(unreadable("missing {\\rtf header".to_string()));
            }
            InputText {
                text: rtf_to_text(&raw),
                format,
                is_markup: false,
            }
        }
        InputFormat::Docx => {
            let (text, styled) = docx_to_markup(&bytes).map_err(unreadable)?;
            InputText {
                text,
                format,
                is_markup: styled,
            }
        }
    };
    debug!(
        "Read {} ({:?}, {} chars)",
        path.display(),
        input.format,
        input.text.chars().count()
    );
    Ok(input)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, Text2DocxError> {
    let to_path = || PathBuf::from(path);
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Text2DocxError::FileNotFound { path: to_path() },
        ErrorKind::PermissionDenied => Text2DocxError::PermissionDenied { path: to_path() },
        _ => Text2DocxError::InputUnreadable {
            path: to_path(),
            detail: e.to_string(),
        },
    })
}

// ── RTF ──────────────────────────────────────────────────────────────────

/// Destinations whose content is not document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer",
    "headerl", "headerr", "headerf", "footerl", "footerr", "footerf", "listtable",
    "listoverridetable", "revtbl", "rsidtbl", "generator", "xmlnstbl", "themedata",
    "colorschememapping", "latentstyles", "datastore", "object", "fldinst",
];

#[derive(Clone, Copy)]
struct Group {
    skip: bool,
    /// Characters to drop after a `\uN` escape.
    uc: usize,
}

/// Strip RTF control words, keeping the document text.
///
/// `\par` and `\line` become newlines, `\page` a form feed, `\tab` a tab.
/// `\'hh` is read as Windows-1252 and `\uN` as a Unicode code point.
pub fn rtf_to_text(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let mut out = String::with_capacity(rtf.len() / 2);
    let mut stack: Vec<Group> = Vec::new();
    let mut group = Group { skip: false, uc: 1 };
    let mut pending_skip = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                stack.push(group);
                i += 1;
                if chars.get(i) == Some(&'\\') && chars.get(i + 1) == Some(&'*') {
                    group.skip = true;
                }
            }
            '}' => {
                group = stack.pop().unwrap_or(group);
                i += 1;
            }
            '\\' => {
                let (word, param, next) = control_word(&chars, i + 1);
                i = next;
                match word.as_str() {
                    "\\" | "{" | "}" => {
                        emit(&mut out, &group, &mut pending_skip, word.chars().next().unwrap_or(' '))
                    }
                    "'" => {
                        let hex: String = chars.iter().skip(i).take(2).collect();
                        i += hex.chars().count();
                        if let Ok(b) = u8::from_str_radix(&hex, 16) {
                            emit(&mut out, &group, &mut pending_skip, cp1252(b));
                        }
                    }
                    "u" => {
                        if let Some(n) = param {
                            let code = if n < 0 { n + 65536 } else { n };
                            if let Some(ch) = u32::try_from(code).ok().and_then(char::from_u32) {
                                if !group.skip {
                                    out.push(ch);
                                }
                            }
                            pending_skip = group.uc;
                        }
                    }
                    "uc" => group.uc = param.map_or(1, |n| n.max(0) as usize),
                    "par" | "line" | "sect" | "row" => {
                        if !group.skip {
                            out.push('\n');
                        }
                    }
                    "page" => {
                        if !group.skip {
                            out.push('\u{c}');
                        }
                    }
                    "tab" | "cell" => {
                        if !group.skip {
                            out.push('\t');
                        }
                    }
                    "emdash" => emit(&mut out, &group, &mut pending_skip, '—'),
                    "endash" => emit(&mut out, &group, &mut pending_skip, '–'),
                    "lquote" => emit(&mut out, &group, &mut pending_skip, '‘'),
                    "rquote" => emit(&mut out, &group, &mut pending_skip, '’'),
                    "ldblquote" => emit(&mut out, &group, &mut pending_skip, '“'),
                    "rdblquote" => emit(&mut out, &group, &mut pending_skip, '”'),
                    "bullet" => emit(&mut out, &group, &mut pending_skip, '•'),
                    "*" => group.skip = true,
                    w if SKIPPED_DESTINATIONS.contains(&w) => group.skip = true,
                    _ => {}
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                emit(&mut out, &group, &mut pending_skip, c);
                i += 1;
            }
        }
    }
    out
}

fn emit(out: &mut String, group: &Group, pending_skip: &mut usize, c: char) {
    if *pending_skip > 0 {
        *pending_skip -= 1;
        return;
    }
    if !group.skip {
        out.push(c);
    }
}

/// Parse the control word starting at `start` (just after the backslash).
/// Returns the word, its numeric parameter, and the index after it.
fn control_word(chars: &[char], start: usize) -> (String, Option<i32>, usize) {
    let Some(&first) = chars.get(start) else {
        return (String::new(), None, start);
    };
    if !first.is_ascii_alphabetic() {
        return (first.to_string(), None, start + 1);
    }
    let mut i = start;
    while chars.get(i).is_some_and(|c| c.is_ascii_alphabetic()) {
        i += 1;
    }
    let word: String = chars[start..i].iter().collect();
    let num_start = i;
    if chars.get(i) == Some(&'-') {
        i += 1;
    }
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    let param = (i > num_start)
        .then(|| chars[num_start..i].iter().collect::<String>())
        .and_then(|s| s.parse().ok());
    // A single space delimits the control word and is not text.
    if chars.get(i) == Some(&' ') {
        i += 1;
    }
    (word, param, i)
}

/// Windows-1252 byte to char.
fn cp1252(b: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8d}', 'Ž', '\u{8f}',
        '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9d}', 'ž', 'Ÿ',
    ];
    match b {
        0x80..=0x9f => HIGH[(b - 0x80) as usize],
        _ => char::from(b),
    }
}

// ── DOCX ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct DocxParagraph {
    style: Option<String>,
    list_level: Option<u8>,
    text: String,
    run_text: String,
    bold: bool,
    italic: bool,
}

impl DocxParagraph {
    fn flush_run(&mut self) {
        let text = escape_inline(&std::mem::take(&mut self.run_text));
        if text.trim().is_empty() || (!self.bold && !self.italic) {
            self.text.push_str(&text);
            return;
        }
        let mark = match (self.bold, self.italic) {
            (true, true) => "***",
            (true, false) => "**",
            _ => "*",
        };
        let lead = &text[..text.len() - text.trim_start().len()];
        let trail = &text[text.trim_end().len()..];
        self.text
            .push_str(&format!("{lead}{mark}{}{mark}{trail}", text.trim()));
    }
}

/// Rewrite a Word package's body as markup.
///
/// Returns the markup and whether any paragraph carried a structural style
/// (heading, title, quote, list). Unstyled documents come back as plain
/// paragraphs separated by blank lines.
pub fn docx_to_markup(bytes: &[u8]) -> Result<(String, bool), String> {
    let mut archive = open_archive(bytes)?;
    let document = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| "package has no word/document.xml".to_string())?;
    let names = match read_part(&mut archive, "word/styles.xml")? {
        Some(styles) => style_names(&styles)?,
        None => HashMap::new(),
    };

    let mut reader = Reader::from_str(&document);
    let mut blocks: Vec<String> = Vec::new();
    let mut para: Option<DocxParagraph> = None;
    let mut in_text = false;
    let mut in_run_props = false;
    let mut in_para_props = false;
    let mut styled = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed word/document.xml: {e}"))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"p" if !is_empty => para = Some(DocxParagraph::default()),
                    b"r" => {
                        if let Some(p) = para.as_mut() {
                            p.bold = false;
                            p.italic = false;
                        }
                    }
                    b"pPr" if !is_empty => in_para_props = true,
                    b"rPr" if !is_empty => in_run_props = true,
                    b"t" if !is_empty => in_text = true,
                    _ => {}
                }
                let Some(p) = para.as_mut() else { continue };
                match local {
                    b"pStyle" => p.style = attr(e, b"val"),
                    b"ilvl" => p.list_level = attr(e, b"val").and_then(|v| v.parse().ok()),
                    b"numId" if p.list_level.is_none() => p.list_level = Some(0),
                    b"b" if in_run_props => p.bold = toggle(e),
                    b"i" if in_run_props => p.italic = toggle(e),
                    b"tab" if !in_para_props => p.run_text.push('\t'),
                    b"br" if !in_para_props => {
                        if attr(e, b"type").as_deref() == Some("page") {
                            p.flush_run();
                            p.text.push('\u{c}');
                        } else {
                            p.run_text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) if in_text => {
                if let Some(p) = para.as_mut() {
                    p.run_text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) if in_text => {
                let entity = String::from_utf8_lossy(&r).into_owned();
                if let (Some(p), Some(text)) = (para.as_mut(), resolve_entity(&entity)) {
                    p.run_text.push_str(&text);
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"t" => in_text = false,
                    b"pPr" => in_para_props = false,
                    b"rPr" => in_run_props = false,
                    b"r" => {
                        if let Some(p) = para.as_mut() {
                            p.flush_run();
                        }
                    }
                    b"p" => {
                        if let Some(mut p) = para.take() {
                            p.flush_run();
                            let (block, structural) = paragraph_markup(&p, &names);
                            styled |= structural;
                            blocks.push(block);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let markup = blocks
        .into_iter()
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok((markup, styled))
}

/// `styleId → name` for every style in `styles.xml`.
fn style_names(xml: &str) -> Result<HashMap<String, String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut names = HashMap::new();
    let mut current: Option<String> = None;
    loop {
        match reader
            .read_event()
            .map_err(|e| format!("malformed word/styles.xml: {e}"))?
        {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"style" => current = attr(&e, b"styleId"),
                    b"name" => {
                        if let (Some(id), Some(val)) = (current.take(), attr(&e, b"val")) {
                            names.insert(id, val);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(names)
}

fn paragraph_markup(p: &DocxParagraph, names: &HashMap<String, String>) -> (String, bool) {
    let style = p.style.as_deref().and_then(|id| {
        names
            .get(id)
            .and_then(|name| StyleId::from_docx_name(name))
            .or_else(|| id.parse::<StyleId>().ok())
    });
    let text = p.text.trim();
    if text.is_empty() {
        return (p.text.contains('\u{c}').then(|| "\u{c}".to_string()).unwrap_or_default(), false);
    }
    let one_line = || text.replace('\n', " ");

    match (style, p.list_level) {
        (Some(StyleId::Title), _) => (format!("# {}", one_line()), true),
        (Some(StyleId::Heading(n)), _) => (format!("{} {}", "#".repeat(n as usize), one_line()), true),
        (Some(StyleId::TocHeading), _) => (format!("# {}", one_line()), true),
        (Some(StyleId::Quote), _) => {
            let lines: Vec<String> = text.lines().map(|l| format!("> {l}")).collect();
            (lines.join("\n"), true)
        }
        (Some(StyleId::ListNumber), level) => (list_line(level, "1.", &one_line()), true),
        (Some(StyleId::ListBullet), level) | (_, level @ Some(_)) => {
            (list_line(level, "-", &one_line()), true)
        }
        _ => {
            let lines: Vec<String> = text.lines().map(escape_line).collect();
            (lines.join("\n"), false)
        }
    }
}

fn list_line(level: Option<u8>, marker: &str, text: &str) -> String {
    let indent = "  ".repeat(level.unwrap_or(0) as usize);
    format!("{indent}{marker} {text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx(document_body: &str, styles: &str) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(&mut buf);
        let opt = SimpleFileOptions::default();
        zip.start_file("word/document.xml", opt).unwrap();
        write!(
            zip,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{document_body}</w:body></w:document>"#
        )
        .unwrap();
        zip.start_file("word/styles.xml", opt).unwrap();
        write!(
            zip,
            r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{styles}</w:styles>"#
        )
        .unwrap();
        zip.finish().unwrap();
        buf.into_inner()
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a.TXT")), InputFormat::PlainText);
        assert_eq!(InputFormat::from_path(Path::new("a.md")), InputFormat::Markup);
        assert_eq!(InputFormat::from_path(Path::new("a.rtf")), InputFormat::Rtf);
        assert_eq!(InputFormat::from_path(Path::new("a.docx")), InputFormat::Docx);
        assert_eq!(InputFormat::from_path(Path::new("notes")), InputFormat::PlainText);
        assert_eq!(InputFormat::from_path(Path::new("a.odt")), InputFormat::PlainText);
    }

    #[test]
    fn rtf_keeps_text_and_paragraphs() {
        let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Times;}}{\colortbl;\red0\green0\blue0;}\f0 Chapter 1\par\par Hello \b world\b0 .\par caf\'e9 \u8212?dash\par}";
        assert_eq!(rtf_to_text(rtf), "Chapter 1\n\nHello world.\ncafé —dash\n");
    }

    #[test]
    fn rtf_skips_starred_destinations() {
        let rtf = r"{\rtf1{\*\generator Foo 1.0;}Text\page More}";
        assert_eq!(rtf_to_text(rtf), "Text\u{c}More");
    }

    #[test]
    fn rtf_escapes() {
        assert_eq!(rtf_to_text(r"{\rtf1 a\{b\}c\\d}"), "a{b}c\\d");
    }

    #[test]
    fn docx_styles_become_markup() {
        let styles = r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style><w:style w:type="paragraph" w:styleId="Zitat"><w:name w:val="Quote"/></w:style>"#;
        let body = r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Chapter 1</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>world</w:t></w:r></w:p><w:p><w:pPr><w:pStyle w:val="Zitat"/></w:pPr><w:r><w:t>Said &amp; done</w:t></w:r></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="1"/><w:numId w:val="3"/></w:numPr></w:pPr><w:r><w:t>nested</w:t></w:r></w:p>"#;
        let (markup, styled) = docx_to_markup(&docx(body, styles)).unwrap();
        assert!(styled);
        assert_eq!(
            markup,
            "# Chapter 1\n\nHello **world**\n\n> Said & done\n\n  - nested"
        );
    }

    #[test]
    fn unstyled_docx_is_plain_text() {
        let body = r#"<w:p><w:r><w:t>1. Not a list</w:t></w:r></w:p><w:p><w:r><w:t>Plain.</w:t></w:r></w:p>"#;
        let (markup, styled) = docx_to_markup(&docx(body, "")).unwrap();
        assert!(!styled);
        assert_eq!(markup, "\\1. Not a list\n\nPlain.");
    }

    #[test]
    fn docx_run_text_is_escaped() {
        let body = r#"<w:p><w:r><w:t xml:space="preserve">C:\_temp </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>5*3</w:t></w:r></w:p>"#;
        let (markup, _) = docx_to_markup(&docx(body, "")).unwrap();
        assert_eq!(markup, r"C:\\\_temp **5\*3**");

        let nodes = crate::structure::markup::parse(&markup);
        assert_eq!(nodes[0].text(), r"C:\_temp 5*3");
        assert!(matches!(&nodes[0], crate::structure::StructuralNode::Paragraph { runs } if runs[1].bold));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_input(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, Text2DocxError::FileNotFound { .. }));
    }

    #[test]
    fn markdown_input_skips_structuring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.md");
        std::fs::write(&path, "\u{feff}# Title\n\nBody").unwrap();
        let input = read_input(&path).unwrap();
        assert!(input.is_markup);
        assert_eq!(input.text, "# Title\n\nBody");
    }
}
