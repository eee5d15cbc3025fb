//! The output package: parts in memory, zipped on demand.

use super::symbols::SeparatorImage;
use super::xml::escape_xml;
use crate::error::Text2DocxError;
use std::io::{self, Cursor, Seek, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// File stem of the separator image under `word/media/`.
pub(crate) const SEPARATOR_MEDIA: &str = "separator";

/// Relationship id the document uses for the separator image.
pub(crate) const SEPARATOR_REL_ID: &str = "rId3";

/// A finished Word document, ready to be written.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub(crate) document_xml: String,
    pub(crate) styles_xml: String,
    pub(crate) numbering_xml: Option<String>,
    pub(crate) separator_image: Option<SeparatorImage>,
}

impl OutputDocument {
    /// `word/document.xml`.
    pub fn document_xml(&self) -> &str {
        &self.document_xml
    }

    /// `word/styles.xml`.
    pub fn styles_xml(&self) -> &str {
        &self.styles_xml
    }

    /// `word/numbering.xml`, present when the document has list items.
    pub fn numbering_xml(&self) -> Option<&str> {
        self.numbering_xml.as_deref()
    }

    /// The chapter-separator image, when a separator drew one.
    pub fn separator_image(&self) -> Option<&SeparatorImage> {
        self.separator_image.as_ref()
    }

    /// Names of the parts the package will contain.
    pub fn part_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/_rels/document.xml.rels",
            "word/styles.xml",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        if self.numbering_xml.is_some() {
            names.push("word/numbering.xml".into());
        }
        if let Some(image) = &self.separator_image {
            names.push(format!("word/{}", media_target(image)));
        }
        names
    }

    /// Write the package to any [`Write`] + [`Seek`] destination.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> io::Result<()> {
        let mut zip = ZipWriter::new(writer);
        let opt = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let numbering = self.numbering_xml.is_some();
        let image = self.separator_image.as_ref();

        zip.start_file("[Content_Types].xml", opt)?;
        zip.write_all(content_types_xml(numbering, image).as_bytes())?;

        zip.start_file("_rels/.rels", opt)?;
        zip.write_all(RELS_XML.as_bytes())?;

        zip.start_file("word/document.xml", opt)?;
        zip.write_all(self.document_xml.as_bytes())?;

        zip.start_file("word/_rels/document.xml.rels", opt)?;
        zip.write_all(word_rels_xml(numbering, image).as_bytes())?;

        zip.start_file("word/styles.xml", opt)?;
        zip.write_all(self.styles_xml.as_bytes())?;

        if let Some(ref xml) = self.numbering_xml {
            zip.start_file("word/numbering.xml", opt)?;
            zip.write_all(xml.as_bytes())?;
        }

        if let Some(image) = image {
            zip.start_file(format!("word/{}", media_target(image)), opt)?;
            zip.write_all(&image.bytes)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// The package as bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Text2DocxError> {
        let mut buf = Cursor::new(Vec::new());
        self.write_to(&mut buf)
            .map_err(|e| Text2DocxError::Internal(format!("packaging failed: {e}")))?;
        Ok(buf.into_inner())
    }

    /// Write to `path` atomically: a temporary file in the same directory,
    /// renamed into place once complete.
    pub fn save(&self, path: &Path) -> Result<(), Text2DocxError> {
        let fail = |source: io::Error| Text2DocxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(fail)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
        self.write_to(tmp.as_file_mut()).map_err(fail)?;
        tmp.as_file_mut().flush().map_err(fail)?;
        tmp.persist(path).map_err(|e| fail(e.error))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

// ── Fixed parts ──────────────────────────────────────────────────────────

/// Path of the separator image relative to `word/`.
fn media_target(image: &SeparatorImage) -> String {
    format!("media/{SEPARATOR_MEDIA}.{}", image.extension)
}

fn content_types_xml(numbering: bool, image: Option<&SeparatorImage>) -> String {
    let numbering_override = if numbering {
        "\n  <Override PartName=\"/word/numbering.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml\"/>"
    } else {
        ""
    };
    let image_default = image
        .filter(|i| !matches!(i.extension.as_str(), "rels" | "xml"))
        .map(|i| {
            format!(
                "\n  <Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape_xml(&i.extension),
                i.content_type()
            )
        })
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>{image_default}
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>{numbering_override}
</Types>"#
    )
}

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

fn word_rels_xml(numbering: bool, image: Option<&SeparatorImage>) -> String {
    let numbering_rel = if numbering {
        "\n  <Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering\" Target=\"numbering.xml\"/>"
    } else {
        ""
    };
    let image_rel = image
        .map(|i| {
            format!(
                "\n  <Relationship Id=\"{SEPARATOR_REL_ID}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/image\" Target=\"{}\"/>",
                escape_xml(&media_target(i))
            )
        })
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>{numbering_rel}{image_rel}
</Relationships>"#
    )
}
