//! Pipeline stages for text-to-DOCX conversion.
//!
//! Each submodule implements one transformation step and is testable on
//! its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ chunking ──▶ detect ──▶ classify ──▶ map ──▶ docx::assemble
//! (file)    (≤ T chars)  (oracle /   (book or    (styles,
//!                         heuristic)  single)     breaks)
//! ```
//!
//! 1. [`input`]    : read `.txt`, `.md`, `.rtf` or `.docx` into text
//! 2. [`chunking`] : split at paragraph, line, word, then character
//!    boundaries so no chunk exceeds the threshold
//! 3. [`detect`]   : structure each chunk concurrently; the oracle with
//!    retry/backoff, the heuristic when it fails
//! 4. [`classify`] : book vs. single unit from the merged node sequence
//! 5. [`map`]      : assign styles, heading levels, page breaks and direct
//!    formatting

pub mod chunking;
pub mod classify;
pub mod detect;
pub mod input;
pub mod map;
