//! Conversion results returned by [`crate::convert`].

use crate::docx::OutputDocument;
use crate::error::Diagnostic;
use crate::pipeline::classify::DocumentType;
use crate::pipeline::detect::StructuringPath;
use serde::{Deserialize, Serialize};

/// Everything a conversion produced.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The finished document; call [`OutputDocument::save`] to write it.
    pub document: OutputDocument,
    pub document_type: DocumentType,
    /// Non-fatal problems, in the order they were raised.
    pub diagnostics: Vec<Diagnostic>,
    /// Reassembled annotated markup, one chunk after another.
    pub markup: String,
    /// Per-chunk structuring records, in `sequence_index` order.
    pub chunks: Vec<ChunkReport>,
    pub stats: ConversionStats,
}

/// How a single chunk was structured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub sequence_index: usize,
    /// Length of the chunk in characters.
    pub chars: usize,
    pub path: StructuringPath,
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Aggregate numbers for a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub input_chars: usize,
    pub total_chunks: usize,
    /// Chunks structured by the oracle.
    pub oracle_chunks: usize,
    /// Chunks structured by the heuristic, including fallbacks.
    pub heuristic_chunks: usize,
    /// Heuristic chunks whose oracle calls all failed.
    pub fallback_chunks: usize,
    /// Chunks taken as markup without structuring.
    pub markup_chunks: usize,
    pub total_elements: usize,
    pub structuring_duration_ms: u64,
    pub assembly_duration_ms: u64,
    pub total_duration_ms: u64,
}
