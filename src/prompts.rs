//! Prompts for LLM-based structure detection.
//!
//! Every prompt lives here so that changing the oracle's instructions means
//! editing exactly one place, and so tests can inspect them without a model.
//!
//! Callers can override the system prompt via
//! [`crate::config::StructuringConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default system prompt for annotating plain text with structure.
///
/// The markup it asks for is exactly the dialect
/// [`crate::structure::markup::parse`] understands.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You convert plain text to well-structured Markdown. You add structure; you never rewrite.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL original text exactly: every word, in the original order
   - Do not add, summarise, translate, or correct anything
   - Keep the original tone and style

2. HEADINGS
   - Identify headings from context and formatting cues
   - Use # for chapters, title pages, dedications, tables of contents and front matter
   - Use ## for sections and parts, ### and below for deeper levels
   - Keep the heading wording exactly as written (e.g. "Chapter 1: Start")

3. LISTS
   - Use - for bulleted lists and 1. 2. 3. for numbered lists
   - Preserve nesting with two-space indentation
   - Dialogue lines are NOT list items, even when they start with a dash

4. QUOTES AND SPECIAL BLOCKS
   - Use > for quotations, epigraphs, verses and citations
   - Wrap code in triple backticks

5. TABLES
   - Convert tabular text to pipe tables (| a | b |)

6. PAGE BREAKS
   - Keep explicit page breaks as <!-- pagebreak --> on a line of its own

7. OUTPUT FORMAT
   - Output ONLY the Markdown
   - Do NOT wrap the output in ```markdown fences
   - Do NOT add explanations, apologies or commentary
   - Do NOT repeat the --- delimiters around the text
   - If the text already has clear structure, preserve it"#;

/// The user turn: the chunk between `---` delimiters.
pub fn analysis_user_message(text: &str) -> String {
    format!("Text to convert:\n---\n{text}\n---")
}
