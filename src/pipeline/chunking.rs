//! Deterministic, lossless chunking of large inputs.
//!
//! ## Algorithm
//!
//! The text is cut into *atoms* at progressively finer boundaries, only as
//! far as needed for each atom to fit the threshold `T` (in characters):
//!
//! 1. paragraph units (a paragraph plus the blank lines after it)
//! 2. lines, for a paragraph longer than `T`
//! 3. words (a word plus the whitespace after it), for a line longer than `T`
//! 4. character runs of `T`, for a single word longer than `T`
//!
//! Heading marker lines (`# …`, or a chapter/section keyword line) are never
//! cut below step 2. Atoms are then packed greedily: a chunk is closed when
//! the next atom would push it past `T`.
//!
//! Atoms are byte ranges of the original text, so concatenating the chunks
//! in `sequence_index` order gives back the input exactly, whitespace
//! included.

use crate::config::{HeadingDetection, KeywordKind};
use crate::structure::heuristic::is_heading_candidate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A contiguous slice of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the document, contiguous from 0.
    pub sequence_index: usize,
    /// Byte offset of `text` in the original input.
    pub offset: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits text into chunks of at most `threshold` characters.
#[derive(Debug, Clone)]
pub struct Chunker {
    threshold: usize,
    detection: HeadingDetection,
}

impl Chunker {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            detection: HeadingDetection::default(),
        }
    }

    /// Use these keyword lists to recognise heading lines.
    pub fn with_detection(mut self, detection: HeadingDetection) -> Self {
        self.detection = detection;
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Split `text`. Empty input gives no chunks; input within the threshold
    /// gives exactly one.
    ///
    /// A heading line longer than the threshold is kept whole, so its chunk
    /// is the only one that may exceed it.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        let t = self.threshold;
        let mut atoms = Vec::new();
        for para in paragraph_units(text) {
            if para.chars <= t {
                atoms.push(para);
                continue;
            }
            for line in line_units(text, para) {
                if line.chars <= t || self.is_heading_line(&text[line.start..line.end]) {
                    atoms.push(line);
                    continue;
                }
                for word in word_units(text, line) {
                    if word.chars <= t {
                        atoms.push(word);
                    } else {
                        atoms.extend(char_units(text, word, t));
                    }
                }
            }
        }

        let chunks = pack(text, &atoms, t);
        debug!(
            "Chunked {} chars into {} chunk(s) (threshold {t})",
            text.chars().count(),
            chunks.len()
        );
        chunks
    }

    /// Markdown heading, or a short line opening with a chapter/section keyword.
    fn is_heading_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            let rest = trimmed.trim_start_matches('#');
            return rest.is_empty() || rest.starts_with([' ', '\t']);
        }
        matches!(
            self.detection.keyword_kind(trimmed),
            Some(KeywordKind::Chapter | KeywordKind::Section)
        ) && is_heading_candidate(trimmed, self.detection.max_heading_chars)
    }
}

/// Split `text` into chunks of at most `threshold` characters.
pub fn split_into_chunks(text: &str, threshold: usize) -> Vec<Chunk> {
    Chunker::new(threshold).split(text)
}

/// Concatenate chunk texts in `sequence_index` order.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.sequence_index);
    ordered.iter().map(|c| c.text.as_str()).collect()
}

// ── Atoms ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

impl Span {
    fn new(text: &str, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            chars: text[start..end].chars().count(),
        }
    }
}

fn paragraph_units(text: &str) -> Vec<Span> {
    let mut units = Vec::new();
    let mut unit_start = 0;
    let mut pos = 0;
    let mut has_content = false;
    let mut in_blank_run = false;
    for line in text.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        if !blank && in_blank_run && has_content {
            units.push(Span::new(text, unit_start, pos));
            unit_start = pos;
            has_content = false;
        }
        if blank {
            in_blank_run = true;
        } else {
            has_content = true;
            in_blank_run = false;
        }
        pos += line.len();
    }
    if unit_start < text.len() {
        units.push(Span::new(text, unit_start, text.len()));
    }
    units
}

fn line_units(text: &str, span: Span) -> Vec<Span> {
    let mut pos = span.start;
    text[span.start..span.end]
        .split_inclusive('\n')
        .map(|line| {
            let s = Span::new(text, pos, pos + line.len());
            pos += line.len();
            s
        })
        .collect()
}

/// Word plus trailing whitespace; leading whitespace joins the first word.
fn word_units(text: &str, span: Span) -> Vec<Span> {
    let slice = &text[span.start..span.end];
    let mut units = Vec::new();
    let mut start = 0;
    let mut seen_word = false;
    let mut prev_ws = false;
    for (i, c) in slice.char_indices() {
        let ws = c.is_whitespace();
        if !ws && prev_ws && seen_word {
            units.push(Span::new(text, span.start + start, span.start + i));
            start = i;
        }
        if !ws {
            seen_word = true;
        }
        prev_ws = ws;
    }
    units.push(Span::new(text, span.start + start, span.end));
    units
}

fn char_units(text: &str, span: Span, max_chars: usize) -> Vec<Span> {
    let slice = &text[span.start..span.end];
    let mut units = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in slice.char_indices() {
        if count == max_chars {
            units.push(Span::new(text, span.start + start, span.start + i));
            start = i;
            count = 0;
        }
        count += 1;
    }
    units.push(Span::new(text, span.start + start, span.end));
    units
}

fn pack(text: &str, atoms: &[Span], max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Option<Span> = None;
    for atom in atoms {
        current = match current {
            Some(c) if c.chars + atom.chars <= max_chars => Some(Span {
                start: c.start,
                end: atom.end,
                chars: c.chars + atom.chars,
            }),
            Some(c) => {
                push_chunk(text, &mut chunks, c);
                Some(*atom)
            }
            None => Some(*atom),
        };
    }
    if let Some(c) = current {
        push_chunk(text, &mut chunks, c);
    }
    chunks
}

fn push_chunk(text: &str, chunks: &mut Vec<Chunk>, span: Span) {
    chunks.push(Chunk {
        sequence_index: chunks.len(),
        offset: span.start,
        text: text[span.start..span.end].to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_input_is_one_chunk() {
        let chunks = split_into_chunks("Chapter 1: Start\n\nHello world.", 10_000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(split_into_chunks("", 100).is_empty());
    }

    #[test]
    fn splits_on_paragraph_boundaries() {
        let text = "aaaa aaaa\n\nbbbb bbbb\n\ncccc cccc\n";
        let chunks = split_into_chunks(text, 12);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaa aaaa\n\n", "bbbb bbbb\n\n", "cccc cccc\n"]);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn unbroken_25k_text_makes_three_chunks() {
        let word = "lorem ";
        let text: String = word.repeat(25_000 / word.len() + 1)[..25_000].to_string();
        let chunks = split_into_chunks(&text, 10_000);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.char_len() <= 10_000));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn heading_lines_are_never_cut() {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!("Chapter {i}\nsome words follow here on this line\n"));
        }
        let chunker = Chunker::new(100);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            // Each chunk starts at a line start, so no heading is split.
            assert!(c.offset == 0 || text.as_bytes()[c.offset - 1] == b'\n');
        }
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn oversized_word_is_cut_on_char_boundaries() {
        let text = "ééééééééééé";
        let chunks = split_into_chunks(text, 4);
        let lens: Vec<usize> = chunks.iter().map(|c| c.char_len()).collect();
        assert_eq!(lens, vec![4, 4, 3]);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn reassemble_orders_by_index() {
        let mut chunks = split_into_chunks("one\n\ntwo\n\nthree", 6);
        chunks.reverse();
        assert_eq!(reassemble(&chunks), "one\n\ntwo\n\nthree");
    }

    #[test]
    fn leading_whitespace_is_kept() {
        let text = "\n\n   indented start\n\nnext";
        let chunks = split_into_chunks(text, 10);
        assert_eq!(reassemble(&chunks), text);
        assert!(chunks.iter().all(|c| c.char_len() <= 10));
    }
}
