//! CLI binary for docutable.
//!
//! Maps CLI flags to `ExtractionConfig`, drives a `SessionStore` through
//! ingest → extract → preview → export, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docutable::{
    display_title, render_text, ExtractedTable, ExtractionClient, ExtractionConfig,
    ExtractionProgressCallback, ItemId, ItemStatus, ProgressCallback, SessionStore, TablePager,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per document. Documents finish out of
/// order, so start times are keyed by name.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, name: &str) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(name))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analyzing {total_items} document(s)…"))
        ));
    }

    fn on_item_start(&self, name: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(name.to_string(), Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, name: &str, table_count: usize) {
        let elapsed = self.elapsed(name);
        self.bar.println(format!(
            "  {} {:<32}  {:<10}  {}",
            green("✓"),
            name,
            dim(&format!("{table_count} table(s)")),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, name: &str, error: &str) {
        let elapsed = self.elapsed(name);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_items: usize, success_count: usize) {
        let failed = total_items.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} document(s) extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) extracted  ({} failed)",
                if failed == total_items {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_items,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract tables from a scanned parts list into ./out
  docutable parts_list.pdf -o out

  # Several files at once, preview in the terminal, no files written
  docutable invoice.png bom.pdf --preview --no-export

  # From a URL
  docutable https://example.com/catalogue.pdf

  # Use a specific provider and model
  docutable --provider openai --model gpt-4.1 scan.jpg

  # Machine-readable output
  docutable --json --no-export scan.jpg > tables.json

OUTPUT:
  One table      → <title or part number>.xlsx
  Several tables → <input name>_tables.zip holding one .xlsx per table

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  DOCUTABLE_PROVIDER      Override provider (gemini, openai, anthropic, ollama)
  DOCUTABLE_MODEL         Override model ID
  RUST_LOG                Override log filter
"#;

/// Extract tables from images and PDFs into Excel spreadsheets.
#[derive(Parser, Debug)]
#[command(
    name = "docutable",
    version,
    about = "Extract tables from images and PDFs into Excel spreadsheets",
    long_about = "Send PNG, JPEG or PDF documents (local files or URLs) to a Vision Language \
Model, preview the tables it finds and export them as .xlsx files. Documents with several \
tables are exported as a .zip archive of spreadsheets.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs (PNG, JPEG, PDF).
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory exported files are written to.
    #[arg(short, long, env = "DOCUTABLE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Vision model ID (e.g. gemini-2.5-flash, gpt-4.1).
    #[arg(long, env = "DOCUTABLE_MODEL")]
    model: Option<String>,

    /// Provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "DOCUTABLE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set \
          (GEMINI_API_KEY first)."
    )]
    provider: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "DOCUTABLE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max output tokens per document.
    #[arg(long, env = "DOCUTABLE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Path to a text file replacing the extraction instructions.
    #[arg(long, env = "DOCUTABLE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Number of documents analysed at once.
    #[arg(short, long, env = "DOCUTABLE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-file size ceiling in MiB.
    #[arg(long, env = "DOCUTABLE_MAX_FILE_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    max_file_mb: u64,

    /// Per-document service timeout in seconds.
    #[arg(long, env = "DOCUTABLE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCUTABLE_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Print every extracted table to stdout.
    #[arg(long, env = "DOCUTABLE_PREVIEW")]
    preview: bool,

    /// Print a JSON summary of every item to stdout.
    #[arg(long, env = "DOCUTABLE_JSON")]
    json: bool,

    /// Do not write any files.
    #[arg(long, env = "DOCUTABLE_NO_EXPORT")]
    no_export: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCUTABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCUTABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCUTABLE_QUIET")]
    quiet: bool,
}

/// `--json` record for one item.
#[derive(Serialize)]
struct ItemReport<'a> {
    id: ItemId,
    name: &'a str,
    media_type: &'a str,
    size: u64,
    status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported: Option<String>,
    tables: &'a [ExtractedTable],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let config = build_config(&cli).await?;

    // ── Ingest ───────────────────────────────────────────────────────────
    let store = SessionStore::new();
    let ids = store.ingest(&cli.inputs, &config).await;
    if ids.is_empty() {
        anyhow::bail!("None of the {} input(s) could be loaded", cli.inputs.len());
    }
    if !cli.quiet && ids.len() < cli.inputs.len() {
        eprintln!(
            "{} {}/{} input(s) loaded, the rest were skipped",
            cyan("⚠"),
            ids.len(),
            cli.inputs.len()
        );
    }

    // ── Extract ──────────────────────────────────────────────────────────
    let client = ExtractionClient::from_config(&config)
        .context("Failed to set up the extraction service")?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let success = store
        .extract_all(&client, config.concurrency, progress.as_ref())
        .await;

    // ── Preview / export / report ────────────────────────────────────────
    let session = store.snapshot();
    let mut reports = Vec::with_capacity(session.len());
    for item in session.items() {
        if cli.preview && !cli.json {
            print_preview(item.name(), item.tables());
        }

        let mut exported = None;
        if !cli.no_export && item.status == ItemStatus::Complete {
            match store.export_item(item.id, &cli.output_dir).await {
                Ok(Some(path)) => {
                    if !cli.quiet {
                        eprintln!(
                            "{}  {}  →  {}",
                            green("✔"),
                            item.name(),
                            bold(&path.display().to_string())
                        );
                    }
                    exported = Some(path.display().to_string());
                }
                Ok(None) => {
                    if !cli.quiet {
                        eprintln!("{}  {}  {}", cyan("⚠"), item.name(), dim("no tables found"));
                    }
                }
                Err(e) => eprintln!("{}  {}  {}", red("✗"), item.name(), red(&e.to_string())),
            }
        } else if !cli.quiet && !show_progress && item.status == ItemStatus::Error {
            eprintln!("{}  {}  {}", red("✗"), item.name(), item.status_line());
        }

        reports.push(ItemReport {
            id: item.id,
            name: item.name(),
            media_type: &item.media_type,
            size: item.source.size(),
            status: item.status,
            error: item.error.as_deref(),
            exported,
            tables: item.tables(),
        });
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise output")?;
        println!("{json}");
    }

    if success == 0 {
        anyhow::bail!("Extraction failed for every document");
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_file_bytes(cli.max_file_mb * 1024 * 1024)
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Page through every table of one item, the way the preview pane does.
fn print_preview(name: &str, tables: &[ExtractedTable]) {
    println!("{}", bold(&format!("── {name} ──")));
    if tables.is_empty() {
        println!("{}\n", dim("No tables found"));
        return;
    }

    let mut pager = TablePager::new();
    loop {
        if let Some(table) = pager.current(tables) {
            println!(
                "{}  {}",
                bold(&display_title(table, pager.index())),
                dim(&pager.position(tables.len()))
            );
            println!("{}", render_text(table));
        }
        if !pager.has_next(tables.len()) {
            break;
        }
        pager.next(tables.len());
    }
}
