//! Error types for the edgequake-text2docx library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`Text2DocxError`]: **Fatal**: the conversion cannot proceed at all
//!   (unreadable reference document, empty input, output cannot be written).
//!   Returned as `Err(Text2DocxError)` from the top-level `convert*` functions.
//!
//! * [`Diagnostic`]: **Non-fatal**: something degraded (a malformed config
//!   file, an oracle timeout on one chunk, an element Word cannot represent)
//!   but the job still produced a document. Collected in
//!   [`crate::output::ConversionOutput::diagnostics`] so callers can decide
//!   whether a degraded result is acceptable.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-text2docx library.
///
/// Recoverable conditions use [`Diagnostic`] and are reported alongside
/// the produced document rather than propagated here.
#[derive(Debug, Error)]
pub enum Text2DocxError {
    // ── Reference errors ──────────────────────────────────────────────────
    /// The reference document could not be opened or has no usable styles.
    #[error("Reference document {} is unusable: {detail}", display_path(.path))]
    ReferenceUnreadable {
        path: Option<PathBuf>,
        detail: String,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input exists but its content could not be decoded.
    #[error("Could not read input '{path}': {detail}")]
    InputUnreadable { path: PathBuf, detail: String },

    /// The input contains no text (empty or whitespace only).
    #[error("Input is empty: nothing to convert")]
    EmptyInput,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!("'{}'", p.display()),
        None => "<in memory>".to_string(),
    }
}

impl Text2DocxError {
    pub(crate) fn reference(path: Option<&std::path::Path>, detail: impl Into<String>) -> Self {
        Text2DocxError::ReferenceUnreadable {
            path: path.map(|p| p.to_path_buf()),
            detail: detail.into(),
        }
    }
}

/// A non-fatal condition reported alongside the produced document.
///
/// Every diagnostic is also logged at `warn` level when it is raised.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The configuration document was malformed; defaults were used instead.
    #[error("Configuration ignored: {detail}")]
    ConfigInvalid { detail: String },

    /// A style override names an identifier this library does not know.
    #[error("Unknown style identifier '{key}' in configuration; override ignored")]
    UnknownStyle { key: String },

    /// The structuring oracle failed for a chunk; the heuristic was used.
    #[error("Chunk {chunk}: structuring oracle unavailable after {attempts} attempt(s): {detail}")]
    OracleUnavailable {
        chunk: usize,
        attempts: u32,
        detail: String,
    },

    /// The structuring oracle timed out on every attempt for a chunk.
    #[error("Chunk {chunk}: structuring oracle timed out after {secs}s ({attempts} attempt(s))")]
    OracleTimeout {
        chunk: usize,
        secs: u64,
        attempts: u32,
    },

    /// The configured model hint was rejected; no retries were made.
    #[error("Chunk {chunk}: model '{hint}' rejected by the structuring oracle: {detail}")]
    InvalidModelHint {
        chunk: usize,
        hint: String,
        detail: String,
    },

    /// An element could not be written as produced: it was downgraded to a
    /// plain paragraph, or characters illegal in XML were removed from it.
    #[error("Element {element}: {detail}")]
    SerializationError { element: usize, detail: String },
}

impl Diagnostic {
    /// Chunk index this diagnostic refers to, if any.
    pub fn chunk(&self) -> Option<usize> {
        match self {
            Diagnostic::OracleUnavailable { chunk, .. }
            | Diagnostic::OracleTimeout { chunk, .. }
            | Diagnostic::InvalidModelHint { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }
}
