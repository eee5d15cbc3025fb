//! # edgequake-text2docx
//!
//! Convert plain text, markup, RTF or Word documents into a Word document
//! styled after a reference template.
//!
//! ## Why this crate?
//!
//! Manuscripts arrive as unstructured text: chapter titles typed as ordinary
//! lines, quotations set off by indentation, lists made with dashes. This
//! crate recovers that structure, with an LLM when one is configured and a
//! deterministic heuristic otherwise, and writes it out using the paragraph
//! styles of a reference `.docx` so the result looks like the template.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Chunk     split at paragraph/line/word boundaries (≤ threshold)
//!  ├─ 2. Detect    concurrent oracle calls; heuristic fallback per chunk
//!  ├─ 3. Classify  book vs. single unit
//!  ├─ 4. Map       styles, heading levels, page breaks, direct formatting
//!  └─ 5. Assemble  word/document.xml + styles + numbering → .docx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_text2docx::{convert, extract_style_model, ConversionConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reference = Arc::new(extract_style_model(Path::new("reference.docx"))?);
//!     // Oracle provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ConversionConfig::default();
//!     let output = convert("Chapter 1: Start\n\nHello world.", reference, &config).await?;
//!     output.document.save(Path::new("out.docx"))?;
//!     for d in &output.diagnostics {
//!         eprintln!("warning: {d}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `text2docx` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-text2docx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Without an LLM
//!
//! Set `structuring.mode` to `heuristic` (or let provider detection fail):
//! every chunk is structured by the rule-based detector and the job still
//! succeeds, with a diagnostic explaining why the oracle was not used.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod docx;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;
pub mod structure;
pub mod style;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    load_config, load_config_str, ConversionConfig, ConversionConfigBuilder, StructuringMode,
};
pub use convert::{convert, convert_file, convert_markup, convert_sync};
pub use docx::OutputDocument;
pub use error::{Diagnostic, Text2DocxError};
pub use output::{ChunkReport, ConversionOutput, ConversionStats};
pub use pipeline::classify::DocumentType;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{structure_stream, ChunkStream};
pub use structure::oracle::{LlmOracle, OracleError, RetryPolicy, StructuringOracle};
pub use style::{extract_style_model, ReferenceStyleSet, StyleId, StyleProperties};
