//! CLI binary for edgequake-ingest.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `IngestConfig`, runs one upload and prints the record.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ingest::{
    EnrichmentRecord, Enricher, ExtractionMethod, Feature, FeatureSet, FileKind, IngestConfig,
    IngestProgressCallback, JsonDirStore, ProgressCallback, RecordStore, StageStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

/// Spinner plus one log line per finished stage. Stages finish out of
/// order, so lines are printed as they arrive.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, filename: &str, kind: FileKind) {
        self.bar.set_prefix("Extracting");
        self.bar.set_message(format!("{filename} ({kind:?})"));
    }

    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        self.bar
            .set_message(format!("OCR page {page_num}/{total_pages}"));
    }

    fn on_extraction_complete(&self, method: ExtractionMethod, chars: usize) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("Extracted {chars} chars")),
            dim(&format!("{method:?}")),
        ));
        self.bar.set_prefix("Enriching");
    }

    fn on_stage_start(&self, stage: Feature) {
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_complete(&self, stage: Feature) {
        self.bar.println(format!("  {} {}", green("✓"), stage));
    }

    fn on_stage_failed(&self, stage: Feature, reason: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        let msg: String = if reason.chars().count() > 80 {
            let head: String = reason.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            reason.to_string()
        };
        self.bar
            .println(format!("  {} {:<10}  {}", red("✗"), stage, dim(&msg)));
    }

    fn on_ingest_complete(&self, produced: usize, selected: usize) {
        self.bar.finish_and_clear();
        let failed = self.failed.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} stages produced output",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&produced.to_string()),
            selected,
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Heuristic enrichment only (no API key needed for text files)
  ingest notes.txt

  # Full enrichment with a language model, stored as JSON
  ingest --llm --store ./records report.pdf

  # Only a few stages
  ingest --features title,severity,keyword memo.md

  # Machine-readable output
  ingest --json scan.png > record.json

  # Read back stored records
  ingest --store ./records --recent 5
  ingest --store ./records --get 0b7c9a5e-...

FEATURES:
  markdown, title, category, keyword, severity, summary, correction
  (summary and correction require --llm)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library is used)
"#;

/// Extract, enrich and store documents.
#[derive(Parser, Debug)]
#[command(
    name = "ingest",
    version,
    about = "Convert a document to Markdown and enrich it with a title, categories, keywords and severity",
    long_about = "Convert an uploaded document (PDF, image or text) to Markdown, by direct \
extraction or vision OCR, then enrich it with a title, categories, keywords, severity, and \
optionally an LLM summary and corrected text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to ingest.
    #[arg(required_unless_present_any = ["recent", "get"])]
    input: Option<PathBuf>,

    /// Persist records as JSON files in this directory.
    #[arg(long, env = "INGEST_STORE")]
    store: Option<PathBuf>,

    /// Print the full record as JSON.
    #[arg(long, env = "INGEST_JSON")]
    json: bool,

    /// Comma-separated stages to run (default: all).
    #[arg(long, env = "INGEST_FEATURES")]
    features: Option<String>,

    /// Load a language model for titles, summary and correction.
    #[arg(long, env = "INGEST_LLM")]
    llm: bool,

    /// LLM model ID (e.g. gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Extraction timeout in seconds.
    #[arg(long, env = "INGEST_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Maximum number of PDF pages sent to OCR.
    #[arg(long, env = "INGEST_MAX_OCR_PAGES", default_value_t = 50)]
    max_ocr_pages: usize,

    /// Concurrent OCR page calls.
    #[arg(short, long, env = "INGEST_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Number of keywords to keep.
    #[arg(long, env = "INGEST_MAX_KEYWORDS", default_value_t = 10)]
    max_keywords: usize,

    /// Number of categories to keep.
    #[arg(long, env = "INGEST_MAX_CATEGORIES", default_value_t = 3)]
    max_categories: usize,

    /// Minimum category score (hits per 1000 chars).
    #[arg(long, env = "INGEST_THRESHOLD", default_value_t = 0.1)]
    threshold: f64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "INGEST_LLM_TIMEOUT", default_value_t = 120)]
    llm_timeout: u64,

    /// List the N most recent stored records (needs --store).
    #[arg(long, requires = "store", conflicts_with = "get")]
    recent: Option<usize>,

    /// Print one stored record by id (needs --store).
    #[arg(long, requires = "store")]
    get: Option<uuid::Uuid>,

    /// Disable the progress spinner.
    #[arg(long, env = "INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INGEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.input.is_some();
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

    let store: Option<Arc<JsonDirStore>> = match cli.store {
        Some(ref dir) => Some(Arc::new(
            JsonDirStore::open(dir).context("Failed to open record store")?,
        )),
        None => None,
    };

    // ── Store queries ────────────────────────────────────────────────────
    if let Some(ref store) = store {
        if let Some(id) = cli.get {
            let record = store.get(id).await.context("Lookup failed")?;
            print_record(&record, cli.json)?;
            return Ok(());
        }
        if let Some(limit) = cli.recent {
            let records = store.recent(limit).await.context("Listing failed")?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&records).context("Failed to serialise records")?
                );
            } else {
                for r in &records {
                    println!(
                        "{}  {}  {}  {}",
                        r.id,
                        r.created_at.format("%Y-%m-%d %H:%M:%S"),
                        r.filename,
                        r.title.as_deref().unwrap_or("-"),
                    );
                }
            }
            return Ok(());
        }
    }

    let Some(ref input) = cli.input else {
        anyhow::bail!("No input document given");
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn IngestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    if !cli.llm && !cli.quiet {
        let needs_llm: Vec<String> = config
            .features
            .enabled()
            .into_iter()
            .filter(|f| f.requires_llm())
            .map(|f| f.to_string())
            .collect();
        if !needs_llm.is_empty() && cli.features.is_some() {
            eprintln!(
                "{} {} need --llm and will be reported as unavailable",
                cyan("⚠"),
                needs_llm.join(", ")
            );
        }
    }

    let mut enricher = Enricher::new(config.clone());
    if let Some(store) = store {
        enricher = enricher.with_store(store);
    }
    if cli.llm {
        match enricher.model().load(&config) {
            Ok(info) => tracing::info!("Model ready: {:?}", info.descriptor),
            Err(e) => {
                if !cli.quiet {
                    eprintln!("{} language model unavailable: {e}", cyan("⚠"));
                }
            }
        }
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let record = enricher
        .ingest_path(input)
        .await
        .with_context(|| format!("Failed to ingest {}", input.display()))?;

    print_record(&record, cli.json)?;
    if !cli.quiet && !cli.json {
        eprintln!(
            "{}  {}ms total  ({}ms extraction)",
            dim(&record.id.to_string()),
            record.total_duration_ms,
            record.extraction_duration_ms,
        );
    }
    Ok(())
}

/// Map CLI args to `IngestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let features = match cli.features {
        Some(ref list) => FeatureSet::parse_list(list).context("Invalid --features")?,
        None => FeatureSet::all(),
    };

    let mut builder = IngestConfig::builder()
        .extraction_timeout_secs(cli.timeout)
        .max_ocr_pages(cli.max_ocr_pages)
        .ocr_concurrency(cli.concurrency)
        .max_keywords(cli.max_keywords)
        .max_categories(cli.max_categories)
        .category_threshold(cli.threshold)
        .llm_timeout_secs(cli.llm_timeout)
        .llm_enabled(cli.llm)
        .feature_set(features);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_record(record: &EnrichmentRecord, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(record).context("Failed to serialise record")?
        );
        return Ok(());
    }

    println!("{}  {}", bold("File:"), record.filename);
    if let Some(ref title) = record.title {
        println!("{} {}", bold("Title:"), title);
    }
    if let Some(ref severity) = record.severity {
        println!(
            "{} {} ({:.2})",
            bold("Severity:"),
            severity.level,
            severity.confidence
        );
    }
    if let Some(ref categories) = record.categories {
        let list: Vec<String> = categories
            .iter()
            .map(|c| format!("{} ({:.2})", c.category, c.confidence))
            .collect();
        println!("{} {}", bold("Categories:"), list.join(", "));
    }
    if let Some(ref keywords) = record.keywords {
        println!("{} {}", bold("Keywords:"), keywords.join(", "));
    }
    let s = &record.statistics;
    println!(
        "{} {} words, {} sentences, {} paragraphs",
        bold("Stats:"),
        s.words,
        s.sentences,
        s.paragraphs
    );
    if let Some(ref summary) = record.summary {
        println!("\n{}\n{}", bold("Summary"), summary);
    }
    for report in record
        .stages
        .iter()
        .filter(|r| r.status == StageStatus::Absent)
    {
        if let Some(ref reason) = report.reason {
            println!("{} {}", red("absent:"), reason);
        }
    }
    println!("\n{}", record.markdown.trim_end());
    Ok(())
}
