//! Deterministic cleanup of oracle output before it is parsed.
//!
//! Models wrap their answer in fences, echo the `---` delimiters the prompt
//! puts around the text, add a one-line preamble, or leak zero-width
//! characters. Each rule here is a pure `&str → String` pass; none touches
//! the wording of the content.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule, in order.
///
/// `input` is the chunk text the oracle was given; it decides whether a
/// leading/trailing `---` line is an echo or genuine content.
///
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer markdown fences
/// 3. Drop a conversational preamble line ("Here is the markdown:")
/// 4. Drop echoed `---` delimiters
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim trailing whitespace per line
/// 7. Collapse 3+ consecutive blank lines down to 1
pub fn clean_oracle_output(output: &str, input: &str) -> String {
    let s = normalise_line_endings(output);
    let s = strip_outer_fences(&s);
    let s = strip_preamble(&s);
    let s = strip_echoed_delimiters(&s, input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    collapse_blank_lines(&s).trim_matches('\n').to_string()
}

/// Whether `output` still carries most of `input`'s letters.
///
/// Markup only adds punctuation, so an answer keeping less than half of the
/// input's letters has summarised or refused instead of structuring.
pub fn preserves_content(input: &str, output: &str) -> bool {
    let letters = |s: &str| s.chars().filter(|c| c.is_alphanumeric()).count();
    let expected = letters(input);
    expected == 0 || letters(output) * 2 >= expected
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer markdown fences ──────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?[ \t]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Conversational preamble ──────────────────────────────────────

static RE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(here\s+is|here's|below\s+is|sure[,!]?)\b[^\n]{0,120}:\s*\n").unwrap()
});

fn strip_preamble(input: &str) -> String {
    RE_PREAMBLE.replace(input, "").to_string()
}

// ── Rule 4: Echoed delimiters ────────────────────────────────────────────

fn strip_echoed_delimiters(output: &str, input: &str) -> String {
    let is_delim = |l: &str| l.trim() == "---";
    let input_lines: Vec<&str> = input.lines().filter(|l| !l.trim().is_empty()).collect();
    let input_opens = input_lines.first().is_some_and(|l| is_delim(l));
    let input_closes = input_lines.last().is_some_and(|l| is_delim(l));

    let mut lines: Vec<&str> = output.lines().collect();
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if !input_opens && lines.first().is_some_and(|l| is_delim(l)) {
        lines.remove(0);
    }
    if !input_closes && lines.last().is_some_and(|l| is_delim(l)) {
        lines.pop();
    }
    lines.join("\n")
}

// ── Rule 5: Invisible characters ─────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Trailing whitespace ──────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 7: Excessive blank lines ────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_outer_fences("```markdown\n# Hi\nthere\n```"), "# Hi\nthere");
        assert_eq!(strip_outer_fences("```\n# Hi\n```"), "# Hi");
        assert_eq!(strip_outer_fences("# Hi"), "# Hi");
    }

    #[test]
    fn strips_preamble_only_at_start() {
        assert_eq!(
            strip_preamble("Here is the structured markdown:\n# Title"),
            "# Title"
        );
        assert_eq!(strip_preamble("# Title\nHere is: x\n"), "# Title\nHere is: x\n");
    }

    #[test]
    fn echoed_delimiters_removed_unless_in_input() {
        assert_eq!(strip_echoed_delimiters("---\n# A\n---", "A"), "# A");
        assert_eq!(
            strip_echoed_delimiters("---\nA\n---", "---\nA\n---"),
            "---\nA\n---"
        );
    }

    #[test]
    fn full_pipeline() {
        let raw = "```markdown\r\n---\r\n# Title\u{200B}\r\n\r\n\r\n\r\nBody   \r\n---\r\n```";
        assert_eq!(clean_oracle_output(raw, "Title\n\nBody"), "# Title\n\nBody");
    }

    #[test]
    fn content_preservation_check() {
        assert!(preserves_content("Hello world", "# Hello world"));
        assert!(preserves_content("", "anything"));
        assert!(!preserves_content(
            "A long paragraph about many different things entirely",
            "Summary."
        ));
    }
}
