//! Rule-based structuring, used when the oracle is unavailable.
//!
//! [`annotate`] turns plain text into the same markup the oracle is asked to
//! produce. It is deterministic: the same text and keyword lists always give
//! the same markup. Lines that already carry markup pass through untouched;
//! everything else is escaped so its characters reach the document as typed.

use crate::config::{HeadingDetection, KeywordKind};
use crate::structure::markup::{escape_inline, escape_text_line};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*([-*+•◦▪]|\d{1,9}[.)])[ \t]+(\S.*)$").unwrap());

static RE_EXISTING_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,9}[ \t]+\S").unwrap());

/// Opening characters that mark a line of dialogue.
const DIALOGUE_OPENERS: &[char] = &['"', '“', '„', '«', '‘', '\'', '—', '–'];

/// Characters that end a sentence rather than a heading.
const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', ',', ';', ':', '…', '"', '”', '’', '\''];

/// Characters that close a sentence.
const SENTENCE_END: &[char] = &['.', '!', '?', '…', '"', '”', '’'];

const MAX_HEADING_WORDS: usize = 12;

/// Annotate plain text with lightweight markup.
pub fn annotate(text: &str, detection: &HeadingDetection) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let blocks = split_blocks(&text);
    let indentation_is_layout = indentation_is_paragraph_style(&blocks);

    let mut out: Vec<String> = Vec::with_capacity(blocks.len());
    let mut in_fence = false;
    for block in &blocks {
        if in_fence || block.iter().any(|l| l.trim_start().starts_with("```")) {
            // Fenced code passes through verbatim; track whether it stays open.
            for line in block {
                if line.trim_start().starts_with("```") {
                    in_fence = !in_fence;
                }
            }
            out.push(block.join("\n"));
            continue;
        }
        out.push(annotate_block(block, detection, indentation_is_layout));
    }
    out.join("\n\n")
}

/// Split on blank lines, keeping page-break characters as their own block.
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        if line.trim().is_empty() && !line.contains('\u{c}') {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// When most blocks are indented, indentation is paragraph layout (first-line
/// indents in a manuscript), not quotation.
fn indentation_is_paragraph_style(blocks: &[Vec<&str>]) -> bool {
    let indented = blocks.iter().filter(|b| is_indented_block(b)).count();
    blocks.len() >= 3 && indented * 2 > blocks.len()
}

fn is_indented(line: &str) -> bool {
    line.starts_with('\t') || line.starts_with("    ")
}

fn is_indented_block(block: &[&str]) -> bool {
    block.iter().all(|l| is_indented(l))
}

fn annotate_block(block: &[&str], detection: &HeadingDetection, indent_is_layout: bool) -> String {
    if !indent_is_layout && is_indented_block(block) && !block.iter().any(|l| RE_LIST_MARKER.is_match(l)) {
        return block
            .iter()
            .map(|l| format!("> {}", escape_inline(l.trim())))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let standalone = block.len() == 1;
    // Headings stand in their own segment so they never merge with prose.
    let mut segments: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut prev_heading = false;
    for (i, raw) in block.iter().enumerate() {
        let line = raw.trim();
        let opens_here = i == 0 || prev_heading || ends_sentence(block[i - 1]);
        prev_heading = false;
        if raw.contains('\u{c}') {
            let parts: Vec<String> = raw
                .trim_matches([' ', '\t'])
                .split('\u{c}')
                .map(|p| if p.trim().is_empty() { String::new() } else { escape_text_line(p.trim()) })
                .collect();
            current.push(parts.join("\u{c}"));
            continue;
        }
        if has_markup(raw) {
            current.push(line.to_string());
            continue;
        }
        if is_list_line(line) {
            if is_dialogue(list_body(line)) {
                current.push(escape_text_line(line));
            } else {
                current.push(escape_list_line(raw));
            }
            continue;
        }
        if opens_here && is_heading_candidate(line, detection.max_heading_chars) {
            let marker = match detection.keyword_kind(line) {
                Some(KeywordKind::Section) => Some("##"),
                Some(_) => Some("#"),
                None if standalone => Some("##"),
                None => None,
            };
            if let Some(marker) = marker {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                segments.push(vec![format!("{marker} {}", escape_inline(line))]);
                prev_heading = true;
                continue;
            }
        }
        current.push(escape_text_line(line));
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
        .iter()
        .map(|s| s.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A line ending a sentence, after which a keyword line may open a heading.
fn ends_sentence(line: &str) -> bool {
    line.trim_end().ends_with(SENTENCE_END)
}

/// Markup the parser already understands.
fn has_markup(line: &str) -> bool {
    let t = line.trim_start();
    RE_EXISTING_HEADING.is_match(t) || t.starts_with('>') || (t.starts_with('|') && t.len() > 1)
}

fn is_list_line(line: &str) -> bool {
    RE_LIST_MARKER.is_match(line)
}

fn list_body(line: &str) -> &str {
    RE_LIST_MARKER
        .captures(line)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
        .unwrap_or(line)
}

/// List line with its marker and indentation kept and its body escaped.
fn escape_list_line(raw: &str) -> String {
    match RE_LIST_MARKER.captures(raw).and_then(|c| c.get(2)) {
        Some(body) => format!("{}{}", &raw[..body.start()], escape_inline(body.as_str().trim_end())),
        None => raw.trim_end().to_string(),
    }
}

pub(crate) fn is_dialogue(line: &str) -> bool {
    line.trim_start().starts_with(DIALOGUE_OPENERS)
}

/// Short, unpunctuated, capitalised, and not dialogue.
pub(crate) fn is_heading_candidate(line: &str, max_chars: usize) -> bool {
    let line = line.trim();
    let Some(first) = line.chars().next() else {
        return false;
    };
    let Some(last) = line.chars().last() else {
        return false;
    };
    line.chars().count() <= max_chars
        && line.split_whitespace().count() <= MAX_HEADING_WORDS
        && first.is_alphanumeric()
        && !first.is_lowercase()
        && !TERMINAL_PUNCTUATION.contains(&last)
        && !is_dialogue(line)
        && !is_list_line(line)
}
