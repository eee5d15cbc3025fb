//! Configuration types for text-to-Word conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`] or loaded from a JSON configuration
//! document (the `formatter_config.json` layout) with [`load_config`].
//!
//! The config is a plain value passed down the pipeline. Nothing in the
//! library reads it from a global.

use crate::docx::symbols::SeparatorImage;
use crate::error::{Diagnostic, Text2DocxError};
use crate::progress::ProgressCallback;
use crate::structure::oracle::{RetryPolicy, StructuringOracle};
use crate::style::{StyleId, StyleProperties};
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for a text-to-Word conversion.
///
/// Built via [`ConversionConfig::builder()`], [`ConversionConfig::default()`]
/// or [`load_config`].
///
/// # Example
/// ```rust
/// use edgequake_text2docx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .chunk_threshold(8_000)
///     .concurrency(2)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_threshold, 8_000);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Per-identifier overrides layered over the reference styles.
    /// A `None` field keeps the reference value.
    pub style_overrides: BTreeMap<StyleId, StyleProperties>,

    /// Keyword lists and heading-level policy.
    pub heading_detection: HeadingDetection,

    /// Where page breaks are inserted.
    pub page_breaks: PageBreaks,

    /// How block quotations are rendered.
    pub blockquote_formatting: BlockquoteFormatting,

    /// Character formatting for runs in other scripts.
    pub script_styling: ScriptStyling,

    /// Ornament paragraph around chapter headings.
    pub chapter_separator: ChapterSeparator,

    /// Maximum chunk size in characters. Default: 10 000.
    ///
    /// Inputs longer than this are split on paragraph boundaries before
    /// structuring, so that no single oracle call exceeds the model's
    /// comfortable context.
    pub chunk_threshold: usize,

    /// Structuring oracle behaviour.
    pub structuring: StructuringConfig,

    /// Optional per-chunk progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            style_overrides: BTreeMap::new(),
            heading_detection: HeadingDetection::default(),
            page_breaks: PageBreaks::default(),
            blockquote_formatting: BlockquoteFormatting::default(),
            script_styling: ScriptStyling::default(),
            chapter_separator: ChapterSeparator::default(),
            chunk_threshold: 10_000,
            structuring: StructuringConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("style_overrides", &self.style_overrides)
            .field("heading_detection", &self.heading_detection)
            .field("page_breaks", &self.page_breaks)
            .field("blockquote_formatting", &self.blockquote_formatting)
            .field("script_styling", &self.script_styling)
            .field("chapter_separator", &self.chapter_separator)
            .field("chunk_threshold", &self.chunk_threshold)
            .field("structuring", &self.structuring)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Continue building from this configuration (e.g. CLI flags over a file).
    pub fn into_builder(self) -> ConversionConfigBuilder {
        ConversionConfigBuilder { config: self }
    }

    /// Parse a JSON configuration document.
    ///
    /// Unknown style identifiers are skipped with a diagnostic; the rest of
    /// the document still applies. A document that is not valid JSON or has
    /// wrongly-typed values is an `Err` carrying the parser message.
    pub fn from_json_str(json: &str) -> Result<(Self, Vec<Diagnostic>), String> {
        let doc: ConfigDocument = serde_json::from_str(json).map_err(|e| e.to_string())?;
        Ok(doc.into_config())
    }

    /// Serialise the serialisable part of this configuration as JSON.
    pub fn to_json_string(&self) -> String {
        let doc = ConfigDocument::from(self);
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Load configuration from an optional JSON file.
///
/// `None` yields the defaults. A missing, unreadable or malformed file also
/// yields the defaults, plus a [`Diagnostic::ConfigInvalid`]; configuration
/// problems never abort a job.
pub fn load_config(path: Option<&Path>) -> (ConversionConfig, Vec<Diagnostic>) {
    let Some(path) = path else {
        return (ConversionConfig::default(), Vec::new());
    };
    match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!("Loading configuration from {}", path.display());
            load_config_str(Some(&text))
        }
        Err(e) => {
            let d = Diagnostic::ConfigInvalid {
                detail: format!("cannot read '{}': {e}", path.display()),
            };
            warn!("{d}");
            (ConversionConfig::default(), vec![d])
        }
    }
}

/// Load configuration from an optional JSON string. See [`load_config`].
pub fn load_config_str(json: Option<&str>) -> (ConversionConfig, Vec<Diagnostic>) {
    let Some(json) = json.filter(|s| !s.trim().is_empty()) else {
        return (ConversionConfig::default(), Vec::new());
    };
    match ConversionConfig::from_json_str(json) {
        Ok(loaded) => loaded,
        Err(detail) => {
            let d = Diagnostic::ConfigInvalid { detail };
            warn!("{d}");
            (ConversionConfig::default(), vec![d])
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn style_override(mut self, id: StyleId, props: StyleProperties) -> Self {
        self.config.style_overrides.insert(id, props);
        self
    }

    pub fn heading_detection(mut self, h: HeadingDetection) -> Self {
        self.config.heading_detection = h;
        self
    }

    pub fn page_breaks(mut self, p: PageBreaks) -> Self {
        self.config.page_breaks = p;
        self
    }

    pub fn blockquote_formatting(mut self, b: BlockquoteFormatting) -> Self {
        self.config.blockquote_formatting = b;
        self
    }

    pub fn script_styling(mut self, s: ScriptStyling) -> Self {
        self.config.script_styling = s;
        self
    }

    pub fn chapter_separator(mut self, s: ChapterSeparator) -> Self {
        self.config.chapter_separator = s;
        self
    }

    pub fn chunk_threshold(mut self, chars: usize) -> Self {
        self.config.chunk_threshold = chars;
        self
    }

    pub fn mode(mut self, mode: StructuringMode) -> Self {
        self.config.structuring.mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.structuring.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.structuring.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.structuring.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.structuring.provider = Some(provider);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn StructuringOracle>) -> Self {
        self.config.structuring.oracle = Some(oracle);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.structuring.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.structuring.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.structuring.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.structuring.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.structuring.max_backoff_ms = ms;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.structuring.timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.structuring.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Text2DocxError> {
        let c = &self.config;
        if c.chunk_threshold == 0 {
            return Err(Text2DocxError::InvalidConfig(
                "Chunk threshold must be ≥ 1 character".into(),
            ));
        }
        if c.structuring.concurrency == 0 {
            return Err(Text2DocxError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.structuring.timeout_secs == 0 {
            return Err(Text2DocxError::InvalidConfig(
                "Oracle timeout must be ≥ 1 second".into(),
            ));
        }
        if c.heading_detection.max_heading_chars == 0 {
            return Err(Text2DocxError::InvalidConfig(
                "max_heading_chars must be ≥ 1".into(),
            ));
        }
        if let Some(level) = c.heading_detection.section_heading_level {
            if !(1..=6).contains(&level) {
                return Err(Text2DocxError::InvalidConfig(format!(
                    "section_heading_level must be 1–6, got {level}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Heading detection ────────────────────────────────────────────────────

/// Which of the two signals wins when a heading's explicit level and its
/// keyword disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordPrecedence {
    /// Chapter/section keywords remap the level. (default)
    #[default]
    Keyword,
    /// The level from the markup is kept as-is.
    Markup,
}

/// The category a keyword list assigns to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordKind {
    Chapter,
    Section,
    Title,
    Dedication,
    Contents,
    FrontMatter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingDetection {
    pub chapter_keywords: Vec<String>,
    pub section_keywords: Vec<String>,
    pub title_keywords: Vec<String>,
    pub dedication_keywords: Vec<String>,
    pub contents_keywords: Vec<String>,
    pub front_matter_keywords: Vec<String>,
    pub always_use_heading_1_for_chapters: bool,
    /// Heading level for section-keyword headings, when set.
    pub section_heading_level: Option<u8>,
    pub keyword_precedence: KeywordPrecedence,
    /// Longer lines are never treated as headings by the heuristic.
    pub max_heading_chars: usize,
}

impl Default for HeadingDetection {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            chapter_keywords: list(&["chapter"]),
            section_keywords: list(&["section", "part"]),
            title_keywords: list(&["title"]),
            dedication_keywords: list(&["dedicated to", "dedication", "in memory of"]),
            contents_keywords: list(&["contents", "table of contents", "toc"]),
            front_matter_keywords: list(&["preface", "foreword", "introduction", "prologue"]),
            always_use_heading_1_for_chapters: true,
            section_heading_level: None,
            keyword_precedence: KeywordPrecedence::Keyword,
            max_heading_chars: 80,
        }
    }
}

impl HeadingDetection {
    /// Classify `text` by the first keyword list it opens with.
    ///
    /// Matching is case-insensitive and anchored at the start of the line,
    /// on a word boundary, after any leading markup `#`s.
    pub fn keyword_kind(&self, text: &str) -> Option<KeywordKind> {
        let lists = [
            (KeywordKind::Chapter, &self.chapter_keywords),
            (KeywordKind::Section, &self.section_keywords),
            (KeywordKind::Contents, &self.contents_keywords),
            (KeywordKind::Dedication, &self.dedication_keywords),
            (KeywordKind::FrontMatter, &self.front_matter_keywords),
            (KeywordKind::Title, &self.title_keywords),
        ];
        let text = text.trim_start().trim_start_matches('#').trim();
        lists
            .into_iter()
            .find(|(_, kws)| starts_with_any(text, kws))
            .map(|(kind, _)| kind)
    }

    pub fn is_contents(&self, text: &str) -> bool {
        self.keyword_kind(text) == Some(KeywordKind::Contents)
    }

    /// Level of a heading after keyword remapping.
    ///
    /// Under [`KeywordPrecedence::Markup`] the markup level is kept.
    pub fn effective_level(&self, level: u8, text: &str) -> u8 {
        if self.keyword_precedence == KeywordPrecedence::Markup {
            return level;
        }
        match self.keyword_kind(text) {
            Some(KeywordKind::Chapter) if self.always_use_heading_1_for_chapters => 1,
            Some(KeywordKind::Section) => self.section_heading_level.unwrap_or(level),
            _ => level,
        }
    }
}

/// Case-insensitive "starts with one of `keywords` at a word boundary".
pub(crate) fn starts_with_any(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|kw| {
        let kw = kw.trim().to_lowercase();
        if kw.is_empty() {
            return false;
        }
        match lower.strip_prefix(kw.as_str()) {
            Some(rest) => rest.chars().next().is_none_or(|c| !c.is_alphanumeric()),
            None => false,
        }
    })
}

// ── Page breaks ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageBreaks {
    /// Break before headings that open with one of these words.
    pub before_keywords: Vec<String>,
    /// Break before headings at these levels.
    pub before_levels: Vec<u8>,
    pub before_chapters: bool,
    pub before_sections: bool,
    /// Keep explicit page-break markers found in the input.
    pub preserve_original: bool,
}

impl Default for PageBreaks {
    fn default() -> Self {
        Self {
            before_keywords: ["title", "dedication", "contents", "preface", "foreword"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            before_levels: Vec::new(),
            before_chapters: false,
            before_sections: false,
            preserve_original: true,
        }
    }
}

// ── Blockquotes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockquoteFormatting {
    pub center_align: bool,
    pub italicize: bool,
    /// Strip leading/trailing em-dashes (attribution dashes) from each line.
    pub remove_em_dashes: bool,
    pub single_line_spacing: bool,
}

impl Default for BlockquoteFormatting {
    fn default() -> Self {
        Self {
            center_align: true,
            italicize: true,
            remove_em_dashes: true,
            single_line_spacing: true,
        }
    }
}

// ── Script styling ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptStyling {
    /// Applied to runs of romanised text with scholarly diacritics.
    pub transliterated: StyleProperties,
    /// Applied to runs in a non-Latin script.
    pub non_latin: StyleProperties,
}

impl Default for ScriptStyling {
    fn default() -> Self {
        Self {
            transliterated: StyleProperties {
                italic: Some(true),
                ..StyleProperties::default()
            },
            non_latin: StyleProperties::default(),
        }
    }
}

// ── Chapter separator ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorPosition {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterSeparator {
    pub enabled: bool,
    pub symbol: String,
    /// Word document supplying the ornament: its first inline image, or
    /// else its first text symbol, replaces `symbol`. Relative paths are
    /// looked up beside the reference document first.
    pub symbol_source: Option<PathBuf>,
    /// The image read from `symbol_source`, set during conversion.
    #[serde(skip)]
    pub image: Option<SeparatorImage>,
    pub position: SeparatorPosition,
    /// Points.
    pub spacing_before: f32,
    /// Points.
    pub spacing_after: f32,
    /// Points.
    pub font_size: f32,
}

impl Default for ChapterSeparator {
    fn default() -> Self {
        Self {
            enabled: false,
            symbol: "❦".into(),
            symbol_source: None,
            image: None,
            position: SeparatorPosition::Before,
            spacing_before: 12.0,
            spacing_after: 12.0,
            font_size: 14.0,
        }
    }
}

// ── Structuring ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuringMode {
    /// Oracle first, heuristic per chunk on failure. (default)
    #[default]
    Auto,
    /// Never call the oracle.
    Heuristic,
}

/// Structuring oracle settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuringConfig {
    pub mode: StructuringMode,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, the provider is auto-detected from the environment.
    #[serde(rename = "provider")]
    pub provider_name: Option<String>,

    /// Model hint passed to the oracle, e.g. "gpt-4.1-nano".
    pub model: Option<String>,

    /// Retries after the first attempt. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Upper bound on one retry delay. Default: 8 000.
    pub max_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub timeout_secs: u64,

    /// Chunks structured at once. Default: 4.
    pub concurrency: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Output token cap per call. Default: 16 384.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    #[serde(skip)]
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Injected oracle. Takes precedence over every provider setting.
    #[serde(skip)]
    pub oracle: Option<Arc<dyn StructuringOracle>>,
}

impl Default for StructuringConfig {
    fn default() -> Self {
        Self {
            mode: StructuringMode::Auto,
            provider_name: None,
            model: None,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_backoff_ms: 8_000,
            timeout_secs: 120,
            concurrency: 4,
            temperature: 0.1,
            max_tokens: 16_384,
            system_prompt: None,
            provider: None,
            oracle: None,
        }
    }
}

impl fmt::Debug for StructuringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuringConfig")
            .field("mode", &self.mode)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("timeout_secs", &self.timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("oracle", &self.oracle.as_ref().map(|_| "<dyn StructuringOracle>"))
            .finish()
    }
}

impl StructuringConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The hint passed to the oracle; empty means "provider default".
    pub fn model_hint(&self) -> &str {
        self.model.as_deref().unwrap_or("")
    }
}

// ── JSON document ────────────────────────────────────────────────────────

/// On-disk layout of the configuration document.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigDocument {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    style_overrides: BTreeMap<String, StyleProperties>,
    /// Older layout: `heading_1` … `heading_6` only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    heading_overrides: BTreeMap<String, StyleProperties>,
    heading_detection: HeadingDetection,
    page_breaks: PageBreaks,
    blockquote_formatting: BlockquoteFormatting,
    script_styling: ScriptStyling,
    chapter_separator: ChapterSeparator,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk_threshold: Option<usize>,
    structuring: StructuringConfig,
}

impl ConfigDocument {
    fn into_config(self) -> (ConversionConfig, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut style_overrides = BTreeMap::new();
        // Explicit style_overrides win over the older heading_overrides section.
        for (key, props) in self.heading_overrides.into_iter().chain(self.style_overrides) {
            match key.parse::<StyleId>() {
                Ok(id) => {
                    style_overrides.insert(id, props);
                }
                Err(_) => {
                    let d = Diagnostic::UnknownStyle { key };
                    warn!("{d}");
                    diagnostics.push(d);
                }
            }
        }
        let mut structuring = self.structuring;
        structuring.concurrency = structuring.concurrency.max(1);
        structuring.timeout_secs = structuring.timeout_secs.max(1);
        let mut heading_detection = self.heading_detection;
        heading_detection.max_heading_chars = heading_detection.max_heading_chars.max(1);
        if let Some(level) = heading_detection.section_heading_level {
            if !(1..=6).contains(&level) {
                let d = Diagnostic::ConfigInvalid {
                    detail: format!("section_heading_level {level} is outside 1–6; ignored"),
                };
                warn!("{d}");
                diagnostics.push(d);
                heading_detection.section_heading_level = None;
            }
        }
        let config = ConversionConfig {
            style_overrides,
            heading_detection,
            page_breaks: self.page_breaks,
            blockquote_formatting: self.blockquote_formatting,
            script_styling: self.script_styling,
            chapter_separator: self.chapter_separator,
            chunk_threshold: self.chunk_threshold.unwrap_or(10_000).max(1),
            structuring,
            progress_callback: None,
        };
        (config, diagnostics)
    }
}

impl From<&ConversionConfig> for ConfigDocument {
    fn from(c: &ConversionConfig) -> Self {
        Self {
            style_overrides: c
                .style_overrides
                .iter()
                .map(|(id, p)| (id.to_string(), p.clone()))
                .collect(),
            heading_overrides: BTreeMap::new(),
            heading_detection: c.heading_detection.clone(),
            page_breaks: c.page_breaks.clone(),
            blockquote_formatting: c.blockquote_formatting.clone(),
            script_styling: c.script_styling.clone(),
            chapter_separator: c.chapter_separator.clone(),
            chunk_threshold: Some(c.chunk_threshold),
            structuring: c.structuring.clone(),
        }
    }
}
