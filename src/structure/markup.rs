//! Parser for the lightweight markup both structuring paths emit.
//!
//! The dialect is a small Markdown subset:
//!
//! | Markup | Node |
//! |--------|------|
//! | `# Title` … `###### Title` | `Heading` (level = number of `#`) |
//! | `- item`, `* item`, `+ item`, `• item`, `◦ item`, `▪ item` | unordered `ListItem` |
//! | `1. item`, `1) item` | ordered `ListItem` |
//! | `> line`, fenced block, 4-space indented block | `Blockquote` |
//! | `\| a \| b \|` | `TableRow` (separator rows skipped) |
//! | form feed, `<!-- pagebreak -->` | `PageBreak` |
//! | anything else | `Paragraph`; consecutive lines joined with `\n` |
//!
//! Inline `**bold**`/`__bold__` and `*italic*`/`_italic_` become run flags;
//! `\*`, `\_`, `\\` and `\#` are literal characters. A leading backslash
//! (`\- text`, `\# text`) forces a plain paragraph line.

use super::{ListKind, Run, ScriptClass, StructuralNode};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#+)[ \t]+(.*?)(?:[ \t]+#+)?[ \t]*$").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([ \t]*)([-*+•◦▪]|\d{1,9}[.)])[ \t]+(\S.*)$").unwrap());

static RE_THEMATIC_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*([-*_])([ \t]*([-*_])){2,}[ \t]*$").unwrap());

static RE_TABLE_SEPARATOR_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:?-{1,}:?$").unwrap());

static RE_PAGE_BREAK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^<!--\s*page\s*-?break\s*-->$").unwrap());

/// Parse markup into structural nodes.
pub fn parse(markup: &str) -> Vec<StructuralNode> {
    let normalised = markup
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{c}', "\n<!-- pagebreak -->\n");
    let mut p = Parser::default();
    for line in normalised.split('\n') {
        p.line(line);
    }
    p.finish()
}

#[derive(Default)]
struct Parser {
    nodes: Vec<StructuralNode>,
    paragraph: Vec<String>,
    quote: Vec<String>,
    fence: Option<Vec<String>>,
    list_indents: Vec<usize>,
}

impl Parser {
    fn line(&mut self, line: &str) {
        if let Some(fenced) = self.fence.as_mut() {
            if line.trim_start().starts_with("```") {
                let lines = std::mem::take(fenced);
                self.fence = None;
                if !lines.is_empty() {
                    self.nodes.push(StructuralNode::Blockquote { lines });
                }
            } else {
                fenced.push(line.trim_end().to_string());
            }
            return;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.flush_text();
            return;
        }
        let indent = indent_width(line);

        if let Some(rest) = escaped_line(trimmed) {
            self.flush_quote();
            self.list_indents.clear();
            self.paragraph.push(rest.to_string());
            return;
        }
        if RE_PAGE_BREAK_MARKER.is_match(trimmed) {
            self.flush_all();
            self.nodes.push(StructuralNode::PageBreak);
            return;
        }
        if trimmed.starts_with("```") {
            self.flush_all();
            self.fence = Some(Vec::new());
            return;
        }
        if indent < 4 {
            if let Some(caps) = RE_HEADING.captures(trimmed) {
                self.flush_all();
                let level = u8::try_from(caps[1].len()).unwrap_or(u8::MAX);
                self.nodes
                    .push(StructuralNode::heading(level, plain_text(&caps[2])));
                return;
            }
        }
        if let Some(rest) = trimmed.strip_prefix('>') {
            self.flush_paragraph();
            self.list_indents.clear();
            let rest = rest.trim_start_matches('>');
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.quote.push(plain_text(rest.trim_end()));
            return;
        }
        if trimmed.starts_with('|') && trimmed.len() > 1 {
            self.flush_all();
            let cells = split_row(trimmed);
            if !cells.iter().all(|c| RE_TABLE_SEPARATOR_CELL.is_match(c)) {
                self.nodes.push(StructuralNode::TableRow {
                    cells: cells.iter().map(|c| plain_text(c)).collect(),
                });
            }
            return;
        }
        if RE_THEMATIC_BREAK.is_match(line) {
            self.flush_all();
            self.nodes.push(StructuralNode::paragraph(trimmed));
            return;
        }
        if indent < 4 || !self.list_indents.is_empty() {
            if let Some(caps) = RE_LIST_ITEM.captures(line) {
                self.flush_paragraph();
                self.flush_quote();
                let kind = if caps[2].starts_with(|c: char| c.is_ascii_digit()) {
                    ListKind::Ordered
                } else {
                    ListKind::Unordered
                };
                let level = self.list_level(indent_width(&caps[1]));
                self.nodes.push(StructuralNode::ListItem {
                    kind,
                    level,
                    text: plain_text(caps[3].trim_end()),
                });
                return;
            }
        }
        if indent >= 4 && self.paragraph.is_empty() {
            self.list_indents.clear();
            self.quote.push(plain_text(trimmed));
            return;
        }

        self.flush_quote();
        self.list_indents.clear();
        self.paragraph.push(trimmed.to_string());
    }

    /// Nesting level from indentation, relative to the enclosing items.
    fn list_level(&mut self, indent: usize) -> u8 {
        while self.list_indents.last().is_some_and(|&last| last > indent) {
            self.list_indents.pop();
        }
        if self.list_indents.last().is_none_or(|&last| indent > last) {
            self.list_indents.push(indent);
        }
        u8::try_from(self.list_indents.len().saturating_sub(1)).unwrap_or(u8::MAX)
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.paragraph).join("\n");
        self.nodes.push(StructuralNode::Paragraph {
            runs: parse_inline(&text),
        });
    }

    fn flush_quote(&mut self) {
        if !self.quote.is_empty() {
            let lines = std::mem::take(&mut self.quote);
            self.nodes.push(StructuralNode::Blockquote { lines });
        }
    }

    /// Paragraph and quote end; list context survives a blank line.
    fn flush_text(&mut self) {
        self.flush_paragraph();
        self.flush_quote();
    }

    fn flush_all(&mut self) {
        self.flush_text();
        self.list_indents.clear();
    }

    fn finish(mut self) -> Vec<StructuralNode> {
        if let Some(lines) = self.fence.take() {
            if !lines.is_empty() {
                self.nodes.push(StructuralNode::Blockquote { lines });
            }
        }
        self.flush_all();
        self.nodes
    }
}

fn indent_width(s: &str) -> usize {
    s.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// `\- text` → `- text` as a forced paragraph line.
const MARKUP_LEADERS: &str = "-*+•◦▪#>|0123456789\\";

fn escaped_line(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('\\')?;
    rest.starts_with(|c: char| MARKUP_LEADERS.contains(c))
        .then_some(rest)
}

/// Backslash-escape the characters inline parsing would consume.
pub fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a line of plain text so it parses back as exactly that text.
pub fn escape_text_line(line: &str) -> String {
    escape_line(&escape_inline(line))
}

/// Prefix `line` with a backslash when it could be read as markup.
///
/// Inline characters in `line` must already be escaped.
pub fn escape_line(line: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with(|c: char| MARKUP_LEADERS.contains(c)) {
        format!("\\{trimmed}")
    } else {
        line.to_string()
    }
}

fn split_row(row: &str) -> Vec<String> {
    let inner = row.trim().trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

// ── Inline emphasis ──────────────────────────────────────────────────────

/// Text with emphasis markers removed.
pub fn plain_text(s: &str) -> String {
    parse_inline(s).into_iter().map(|r| r.text).collect()
}

/// Split paragraph text into runs by emphasis and script class.
pub fn parse_inline(s: &str) -> Vec<Run> {
    let chars: Vec<char> = s.chars().collect();
    let mut runs: Vec<Run> = Vec::new();
    let mut buf = String::new();
    let (mut bold, mut italic) = (false, false);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let prev = if i == 0 { None } else { Some(chars[i - 1]) };
        if c == '\\' && i + 1 < chars.len() && "*_\\#".contains(chars[i + 1]) {
            buf.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == '*' || c == '_' {
            let double = chars.get(i + 1) == Some(&c);
            let width = if double { 2 } else { 1 };
            let next = chars.get(i + width).copied();
            let open = if double { bold } else { italic };
            let toggles = if open {
                prev.is_some_and(|p| !p.is_whitespace())
                    && (c == '*' || next.is_none_or(|n| !n.is_alphanumeric()))
            } else {
                next.is_some_and(|n| !n.is_whitespace())
                    && (c == '*' || prev.is_none_or(|p| !p.is_alphanumeric()))
                    && has_closer(&chars[i + width..], c, double)
            };
            if toggles {
                push_segments(&mut runs, &buf, bold, italic);
                buf.clear();
                if double {
                    bold = !bold;
                } else {
                    italic = !italic;
                }
                i += width;
                continue;
            }
        }
        buf.push(c);
        i += 1;
    }
    push_segments(&mut runs, &buf, bold, italic);
    if runs.is_empty() {
        runs.push(Run::plain(""));
    }
    runs
}

fn has_closer(rest: &[char], c: char, double: bool) -> bool {
    let mut i = 0;
    while i < rest.len() {
        if rest[i] == c {
            let is_double = rest.get(i + 1) == Some(&c);
            if is_double == double && i > 0 && !rest[i - 1].is_whitespace() {
                return true;
            }
            if is_double {
                i += 1;
            }
        }
        i += 1;
    }
    false
}

/// Append `text` as one or more runs, splitting where the script class changes.
fn push_segments(runs: &mut Vec<Run>, text: &str, bold: bool, italic: bool) {
    for (segment, script_class) in split_by_script(text) {
        match runs.last_mut() {
            Some(last)
                if last.bold == bold
                    && last.italic == italic
                    && last.script_class == script_class =>
            {
                last.text.push_str(&segment)
            }
            _ => runs.push(Run {
                text: segment,
                script_class,
                bold,
                italic,
            }),
        }
    }
}

/// Word-level script segmentation; whitespace sticks to the preceding word.
pub fn split_by_script(text: &str) -> Vec<(String, ScriptClass)> {
    let mut out: Vec<(String, ScriptClass)> = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let ws_end = rest[word_end..]
            .find(|c: char| !c.is_whitespace())
            .map(|n| word_end + n)
            .unwrap_or(rest.len());
        let (token, tail) = rest.split_at(ws_end);
        let class = ScriptClass::of(&token[..word_end]);
        match out.last_mut() {
            Some((last, last_class)) if *last_class == class || word_end == 0 => last.push_str(token),
            _ => out.push((token.to_string(), class)),
        }
        rest = tail;
    }
    out
}
