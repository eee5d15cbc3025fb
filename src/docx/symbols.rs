//! Chapter-separator marks read from a symbols document.
//!
//! A symbols document is an ordinary Word package holding the ornament to
//! repeat between chapters. The first inline image wins; without one, the
//! first text token that looks like a symbol is used.

use super::xml::{attr, local_name, open_archive, read_binary_part, read_part, resolve_entity};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Half an inch, used when the drawing states no extent.
const DEFAULT_EXTENT_EMU: u64 = 457_200;

/// Code points above this are ornaments rather than letters.
const SYMBOL_CODE_POINT: u32 = 8000;

/// An image drawn as the chapter separator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeparatorImage {
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
    /// Lower-case extension of the media part (`png`, `jpeg`, …).
    pub extension: String,
    pub width_emu: u64,
    pub height_emu: u64,
}

impl SeparatorImage {
    /// MIME type for the package's content-type table.
    pub fn content_type(&self) -> &'static str {
        match self.extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            "emf" => "image/x-emf",
            "wmf" => "image/x-wmf",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

/// What a symbols document yields.
#[derive(Debug, Clone, PartialEq)]
pub enum SeparatorMark {
    Image(SeparatorImage),
    Symbol(String),
}

/// Read the separator mark from the symbols document at `path`.
pub fn read_separator_mark(path: &Path) -> Result<SeparatorMark, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    separator_mark_from_bytes(&bytes)
}

/// Read the separator mark from a symbols document in memory.
pub fn separator_mark_from_bytes(bytes: &[u8]) -> Result<SeparatorMark, String> {
    let mut archive = open_archive(bytes)?;
    let document = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| "package has no word/document.xml".to_string())?;
    let scan = scan_document(&document)?;

    if let Some(drawing) = scan.drawing {
        let rels = read_part(&mut archive, "word/_rels/document.xml.rels")?
            .ok_or_else(|| "image has no relationships part".to_string())?;
        let target = relationship_target(&rels, &drawing.embed)?
            .ok_or_else(|| format!("image relationship {} not found", drawing.embed))?;
        let name = match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("word/{target}"),
        };
        let data = read_binary_part(&mut archive, &name)?
            .ok_or_else(|| format!("image part {name} is missing"))?;
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        return Ok(SeparatorMark::Image(SeparatorImage {
            bytes: data.into(),
            extension,
            width_emu: drawing.cx.unwrap_or(DEFAULT_EXTENT_EMU),
            height_emu: drawing.cy.unwrap_or(DEFAULT_EXTENT_EMU),
        }));
    }

    scan.paragraphs
        .iter()
        .flat_map(|p| p.split_whitespace())
        .find(|token| is_symbol(token))
        .map(|token| SeparatorMark::Symbol(token.to_string()))
        .ok_or_else(|| "no image or symbol found".to_string())
}

/// Short non-alphanumeric tokens, single non-ASCII characters, and anything
/// carrying a dingbat-range code point.
fn is_symbol(token: &str) -> bool {
    let count = token.chars().count();
    (count <= 3 && !token.chars().all(char::is_alphanumeric))
        || (count == 1 && token.chars().all(|c| !c.is_ascii()))
        || token.chars().any(|c| u32::from(c) > SYMBOL_CODE_POINT)
}

struct Drawing {
    embed: String,
    cx: Option<u64>,
    cy: Option<u64>,
}

#[derive(Default)]
struct Scan {
    drawing: Option<Drawing>,
    paragraphs: Vec<String>,
}

/// First drawing with an embedded picture, and every paragraph's text.
fn scan_document(xml: &str) -> Result<Scan, String> {
    let mut reader = Reader::from_str(xml);
    let mut scan = Scan::default();
    let mut extent: (Option<u64>, Option<u64>) = (None, None);
    let mut in_drawing = false;
    let mut in_text = false;
    let mut paragraph = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed word/document.xml: {e}"))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"drawing" if !is_empty => {
                        in_drawing = true;
                        extent = (None, None);
                    }
                    b"extent" if in_drawing => {
                        let dim = |key: &[u8]| attr(e, key).and_then(|v| v.parse().ok());
                        extent = (dim(b"cx"), dim(b"cy"));
                    }
                    b"blip" if in_drawing && scan.drawing.is_none() => {
                        if let Some(embed) = attr(e, b"embed") {
                            scan.drawing = Some(Drawing {
                                embed,
                                cx: extent.0,
                                cy: extent.1,
                            });
                        }
                    }
                    b"t" if !is_empty => in_text = true,
                    _ => {}
                }
            }
            Event::Text(t) if in_text => paragraph.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) if in_text => {
                if let Some(text) = resolve_entity(&String::from_utf8_lossy(&r)) {
                    paragraph.push_str(&text);
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"drawing" => in_drawing = false,
                    b"t" => in_text = false,
                    b"p" => scan.paragraphs.push(std::mem::take(&mut paragraph)),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(scan)
}

/// `Target` of the relationship with id `id`.
fn relationship_target(rels: &str, id: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(rels);
    loop {
        match reader
            .read_event()
            .map_err(|e| format!("malformed relationships part: {e}"))?
        {
            Event::Start(e) | Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"Relationship"
                    && attr(&e, b"Id").as_deref() == Some(id)
                {
                    return Ok(attr(&e, b"Target"));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}
