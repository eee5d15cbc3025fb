//! CLI binary for edgequake-text2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_text2docx::pipeline::input::read_input;
use edgequake_text2docx::{
    convert, convert_markup, extract_style_model, load_config, ConversionConfig,
    ConversionOutput, ConversionProgressCallback, Diagnostic, ProgressCallback, StructuringMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar over chunks; chunks may complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            fallbacks: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_chunks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_chunks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Structuring");
    }

    fn on_chunk_start(&self, index: usize, _total: usize) {
        self.bar.set_message(format!("chunk {}", index + 1));
    }

    fn on_chunk_fallback(&self, index: usize, total: usize, reason: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        let reason: String = if reason.chars().count() > 80 {
            reason.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            yellow("⚡"),
            index + 1,
            total,
            dim(&format!("heuristic fallback: {reason}")),
        ));
    }

    fn on_chunk_complete(&self, _index: usize, _total: usize, _used_oracle: bool) {
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_chunks: usize, oracle_chunks: usize) {
        self.bar.finish_and_clear();
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        eprintln!(
            "{} {} chunk(s) structured  ({} by oracle, {} fallback)",
            if fallbacks == 0 { green("✔") } else { cyan("⚠") },
            bold(&total_chunks.to_string()),
            oracle_chunks,
            fallbacks
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Format a manuscript after the default reference document
  text2docx manuscript.txt

  # Explicit reference and output
  text2docx chapter.rtf -r house-style.docx -o chapter.docx

  # Markdown input (structuring skipped)
  text2docx notes.md -r template.dotx

  # No LLM: rule-based structure only
  text2docx --heuristic manuscript.txt

  # Keep the annotated markup next to the output
  text2docx --save-markdown manuscript.txt

  # Print the effective configuration as JSON
  text2docx --dump-config --config formatter_config.json

REFERENCE DOCUMENT LOOKUP (when -r is not given):
  ./referenceformat.docx, ~/Documents/referenceformat.docx,
  ~/Desktop/referenceformat.docx

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not set
  EDGEQUAKE_MODEL         Model ID
  TEXT2DOCX_REFERENCE     Reference document
  TEXT2DOCX_CONFIG        Configuration file (JSON)
  RUST_LOG                Log filter, overrides -v/-q
"#;

/// Restyle text after a reference Word document.
#[derive(Parser, Debug)]
#[command(
    name = "text2docx",
    version,
    about = "Restyle plain text, Markdown, RTF and Word files after a reference .docx",
    long_about = "Convert manuscripts into Word documents that use the paragraph styles of a \
reference document. Structure (chapters, headings, quotes, lists) is detected by an LLM \
when one is configured, and by deterministic rules otherwise.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file (.txt, .md, .rtf, .docx; other extensions are read as text).
    #[arg(required_unless_present = "dump_config")]
    input: Option<PathBuf>,

    /// Reference .docx/.dotx whose styles the output uses.
    #[arg(short, long, env = "TEXT2DOCX_REFERENCE")]
    reference: Option<PathBuf>,

    /// Output file. Default: `<input stem>_formatted.docx` next to the input.
    #[arg(short, long, env = "TEXT2DOCX_OUTPUT")]
    output: Option<PathBuf>,

    /// JSON configuration file (formatter_config.json layout).
    #[arg(short, long, env = "TEXT2DOCX_CONFIG")]
    config: Option<PathBuf>,

    /// LLM model ID used as the structuring model hint.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Skip the LLM and structure with rules only.
    #[arg(long, env = "TEXT2DOCX_HEURISTIC")]
    heuristic: bool,

    /// Chunks structured concurrently.
    #[arg(long, env = "TEXT2DOCX_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Maximum characters per structuring chunk.
    #[arg(long, env = "TEXT2DOCX_CHUNK_THRESHOLD")]
    chunk_threshold: Option<usize>,

    /// Retries per chunk on oracle failure.
    #[arg(long, env = "TEXT2DOCX_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Per-call oracle timeout in seconds.
    #[arg(long, env = "TEXT2DOCX_TIMEOUT")]
    timeout: Option<u64>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "TEXT2DOCX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Also write the annotated markup as `<input stem>_markdown.md`.
    #[arg(long, env = "TEXT2DOCX_SAVE_MARKDOWN")]
    save_markdown: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    dump_config: bool,

    /// Print stats and diagnostics as JSON.
    #[arg(long, env = "TEXT2DOCX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEXT2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEXT2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEXT2DOCX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dump_config;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let (config, config_diagnostics) = build_config(&cli, progress_cb).await?;

    if cli.dump_config {
        println!("{}", config.to_json_string());
        return Ok(());
    }

    let input = cli
        .input
        .as_deref()
        .context("An input file is required")?;
    let reference_path = match cli.reference.clone() {
        Some(p) => p,
        None => find_default_reference().context(
            "No reference document given and none found; pass --reference <file.docx>",
        )?,
    };
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| sibling(input, "_formatted.docx"));

    // ── Run conversion ───────────────────────────────────────────────────
    let reference = Arc::new(
        extract_style_model(&reference_path).context("Failed to load reference document")?,
    );
    let source = read_input(input).context("Failed to read input")?;
    let mut output = if source.is_markup {
        convert_markup(&source.text, reference, &config).await
    } else {
        convert(&source.text, reference, &config).await
    }
    .context("Conversion failed")?;
    output.diagnostics.splice(0..0, config_diagnostics);

    output
        .document
        .save(&output_path)
        .context("Failed to write output document")?;

    if cli.save_markdown {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let md_path = output_path.with_file_name(format!("{stem}_markdown.md"));
        tokio::fs::write(&md_path, &output.markup)
            .await
            .with_context(|| format!("Failed to write {}", md_path.display()))?;
        if !cli.quiet && !cli.json {
            eprintln!("   markup saved to {}", dim(&md_path.display().to_string()));
        }
    }

    report(&cli, &output, &output_path)?;
    Ok(())
}

/// Map CLI args (over the optional config file) to `ConversionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
) -> Result<(ConversionConfig, Vec<Diagnostic>)> {
    let (base, diagnostics) = load_config(cli.config.as_deref());
    let mut builder = base.into_builder();

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if cli.heuristic {
        builder = builder.mode(StructuringMode::Heuristic);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(n) = cli.chunk_threshold {
        builder = builder.chunk_threshold(n);
    }
    if let Some(n) = cli.max_retries {
        builder = builder.max_retries(n);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build().context("Invalid configuration")?;
    Ok((config, diagnostics))
}

/// `dir/<stem><suffix>` for `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!("{stem}{suffix}"))
}

/// `referenceformat.docx` in the working directory, `~/Documents` or `~/Desktop`.
fn find_default_reference() -> Option<PathBuf> {
    let name = "referenceformat.docx";
    let mut candidates = vec![PathBuf::from(name)];
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        candidates.push(home.join("Documents").join(name));
        candidates.push(home.join("Desktop").join(name));
    }
    candidates.into_iter().find(|p| p.is_file())
}

fn report(cli: &Cli, output: &ConversionOutput, path: &Path) -> Result<()> {
    if cli.json {
        let summary = serde_json::json!({
            "output": path.display().to_string(),
            "document_type": output.document_type,
            "stats": output.stats,
            "chunks": output.chunks,
            "diagnostics": output.diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }
    for d in &output.diagnostics {
        eprintln!("  {} {}", yellow("!"), d);
    }
    eprintln!(
        "{}  {} chunk(s), {}  {} elements  {}ms  →  {}",
        if output.diagnostics.is_empty() { green("✔") } else { cyan("⚠") },
        output.stats.total_chunks,
        output.document_type,
        output.stats.total_elements,
        output.stats.total_duration_ms,
        bold(&path.display().to_string()),
    );
    Ok(())
}
