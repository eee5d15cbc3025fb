//! Eager (whole-document) conversion entry points.
//!
//! [`convert`] runs every stage and returns once the document is assembled.
//! Use [`crate::stream::structure_stream`] instead when you want chunk
//! outcomes as they complete.

use crate::config::{ChapterSeparator, ConversionConfig};
use crate::docx::assemble;
use crate::docx::symbols::{read_separator_mark, SeparatorMark};
use crate::error::{Diagnostic, Text2DocxError};
use crate::output::{ChunkReport, ConversionOutput, ConversionStats};
use crate::pipeline::chunking::Chunker;
use crate::pipeline::classify::classify;
use crate::pipeline::detect::{StructureDetector, StructuringPath};
use crate::pipeline::input::read_input;
use crate::pipeline::map::map_document;
use crate::style::{extract_style_model, ReferenceStyleSet, ResolvedStyles};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert plain text into a document styled after `style_model`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutput)` whenever a document was produced, including when
/// every chunk fell back to heuristic structuring (check
/// `output.diagnostics`).
///
/// # Errors
/// [`Text2DocxError::EmptyInput`] when `text` has no visible content.
pub async fn convert(
    text: &str,
    style_model: Arc<ReferenceStyleSet>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Text2DocxError> {
    run(text, false, style_model, config, None).await
}

/// Convert text that is already markup; the structuring oracle is bypassed.
pub async fn convert_markup(
    markup: &str,
    style_model: Arc<ReferenceStyleSet>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Text2DocxError> {
    run(markup, true, style_model, config, None).await
}

/// Read `input`, convert it against the reference at `reference`, and write
/// the result to `output` atomically.
///
/// The input reader is chosen by extension (see [`crate::pipeline::input`]).
pub async fn convert_file(
    input: impl AsRef<Path>,
    reference: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Text2DocxError> {
    let (input, reference, output) = (input.as_ref(), reference.as_ref(), output.as_ref());
    info!("Starting conversion: {}", input.display());

    let style_model = Arc::new(extract_style_model(reference)?);
    let source = read_input(input)?;
    let result = run(&source.text, source.is_markup, style_model, config, reference.parent()).await?;
    result.document.save(output)?;
    info!("Wrote {}", output.display());
    Ok(result)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    text: &str,
    style_model: Arc<ReferenceStyleSet>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Text2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Text2DocxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(text, style_model, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// `reference_dir` is where a relative `chapter_separator.symbol_source` is
/// looked up first.
async fn run(
    text: &str,
    is_markup: bool,
    style_model: Arc<ReferenceStyleSet>,
    config: &ConversionConfig,
    reference_dir: Option<&Path>,
) -> Result<ConversionOutput, Text2DocxError> {
    let total_start = Instant::now();
    if text.trim().is_empty() {
        return Err(Text2DocxError::EmptyInput);
    }
    let input_chars = text.chars().count();

    // ── Step 1: Chunk ────────────────────────────────────────────────────
    let chunks = Chunker::new(config.chunk_threshold)
        .with_detection(config.heading_detection.clone())
        .split(text);
    info!(
        "Converting {} chars in {} chunk(s) (threshold {})",
        input_chars,
        chunks.len(),
        config.chunk_threshold
    );

    // ── Step 2: Structure each chunk ─────────────────────────────────────
    let structuring_start = Instant::now();
    let detector = StructureDetector::new(config).with_markup_input(is_markup);
    let mut diagnostics: Vec<Diagnostic> = detector.setup_diagnostics().to_vec();
    let outcomes = detector.detect_all(&chunks).await;
    let structuring_duration_ms = structuring_start.elapsed().as_millis() as u64;

    let mut nodes = Vec::new();
    let mut markup_parts = Vec::with_capacity(outcomes.len());
    let mut reports = Vec::with_capacity(outcomes.len());
    for (outcome, chunk) in outcomes.into_iter().zip(&chunks) {
        reports.push(ChunkReport {
            sequence_index: outcome.sequence_index,
            chars: chunk.char_len(),
            path: outcome.path,
            attempts: outcome.attempts,
            duration_ms: outcome.duration_ms,
        });
        diagnostics.extend(outcome.diagnostics);
        nodes.extend(outcome.nodes);
        markup_parts.push(outcome.markup.trim_end().to_string());
    }
    let markup = markup_parts.join("\n\n");

    // ── Step 3: Classify, merge styles, map ──────────────────────────────
    let mut config = Cow::Borrowed(config);
    if let Some(separator) = resolve_separator(&config, reference_dir, &mut diagnostics) {
        config.to_mut().chapter_separator = separator;
    }
    let config = config.as_ref();
    let document_type = classify(&nodes, &config.heading_detection);
    debug!("{} structural node(s); document type {}", nodes.len(), document_type);
    let styles = ResolvedStyles::merge(Arc::clone(&style_model), config);
    let elements = map_document(&nodes, document_type, config, &styles);

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let assembly_start = Instant::now();
    let (document, serialization) = assemble(&elements, &style_model);
    diagnostics.extend(serialization);
    let assembly_duration_ms = assembly_start.elapsed().as_millis() as u64;

    let count = |path: StructuringPath| reports.iter().filter(|r| r.path == path).count();
    let stats = ConversionStats {
        input_chars,
        total_chunks: reports.len(),
        oracle_chunks: count(StructuringPath::Oracle),
        heuristic_chunks: count(StructuringPath::Heuristic),
        fallback_chunks: reports
            .iter()
            .filter(|r| r.path == StructuringPath::Heuristic && r.attempts > 0)
            .count(),
        markup_chunks: count(StructuringPath::Markup),
        total_elements: elements.len(),
        structuring_duration_ms,
        assembly_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} element(s), {} diagnostic(s), {}ms total",
        stats.total_elements,
        diagnostics.len(),
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        document,
        document_type,
        diagnostics,
        markup,
        chunks: reports,
        stats,
    })
}

/// The chapter separator with its `symbol_source` read, when there is one
/// to read. A source that cannot be used leaves `symbol` in place.
fn resolve_separator(
    config: &ConversionConfig,
    reference_dir: Option<&Path>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ChapterSeparator> {
    let separator = &config.chapter_separator;
    let source = separator.symbol_source.as_deref().filter(|_| separator.enabled)?;
    let path = match reference_dir {
        Some(dir) if source.is_relative() && dir.join(source).is_file() => dir.join(source),
        _ => source.to_path_buf(),
    };
    let mut resolved = separator.clone();
    match read_separator_mark(&path) {
        Ok(SeparatorMark::Image(image)) => {
            debug!(
                "Chapter separator image from {} ({}, {}x{} EMU)",
                path.display(),
                image.extension,
                image.width_emu,
                image.height_emu
            );
            resolved.image = Some(image);
        }
        Ok(SeparatorMark::Symbol(symbol)) => {
            debug!("Chapter separator symbol '{symbol}' from {}", path.display());
            resolved.symbol = symbol;
        }
        Err(detail) => {
            let d = Diagnostic::ConfigInvalid {
                detail: format!(
                    "chapter_separator.symbol_source {}: {detail}; using '{}'",
                    path.display(),
                    separator.symbol
                ),
            };
            warn!("{d}");
            diagnostics.push(d);
            return None;
        }
    }
    Some(resolved)
}
