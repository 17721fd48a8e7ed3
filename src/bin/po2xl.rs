//! CLI binary for po2xl.
//!
//! A thin shim over the library crate: it maps CLI flags to
//! `ExtractionConfig`, feeds documents to an `ExtractionSession` one at a
//! time and prints what came back.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use po2xl::{
    api_key_from_env, inspect, DocumentSummary, ExtractionConfig, ExtractionOutput,
    ExtractionProgressCallback, ExtractionSession, ProgressCallback, Stage, UploadReport,
};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

/// Terminal progress callback: a spinner naming the stage the current
/// document is in, and one log line per finished document.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, document: &str) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_prefix(display_name(document));
        self.bar.set_message("starting…");
    }

    fn on_stage(&self, _document: &str, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_document_complete(&self, document: &str, rows: usize, columns: usize) {
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            display_name(document),
            dim(&format!("{rows} rows × {columns} columns")),
            dim(&self.elapsed()),
        ));
        self.bar.set_message("");
    }

    fn on_document_error(&self, document: &str, error: &str) {
        // First line only; the full message is printed with the report.
        let first = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            display_name(document),
            red(first),
            dim(&self.elapsed()),
        ));
        self.bar.set_message("");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a scanned purchase order; writes ./data.xlsx
  po2xl purchase_order.png

  # A text PDF, also showing the extracted text preview
  po2xl --show-text po.pdf

  # Several documents; each gets <output-dir>/<stem>/data.xlsx
  po2xl -o out/ po1.jpg po2.pdf po3.png

  # From a URL
  po2xl https://example.com/po/4711.pdf

  # Keep a session open and paste one path per line
  po2xl --interactive

  # JSON on stdout, no spreadsheet
  po2xl --json --no-export po.png > po.json

  # Check what a file is classified as (no API key needed)
  po2xl --inspect-only scan.jpeg

SUPPORTED INPUTS:
  image/jpeg (.jpg, .jpeg)   sent to the model as an image
  image/png  (.png)          sent to the model as an image
  application/pdf (.pdf)     text layer extracted, sent as plain text

EXTRACTED FIELDS (one row per line item):
  Vendor Name, Vendor City, Item Code, Item Name,
  Number of Items Requested, Unit Price, Total Price

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY     Google Gemini API key
  GOOGLE_API_KEY     Accepted as an alias for GEMINI_API_KEY
  PO2XL_PROVIDER     Override provider (gemini, openai, anthropic, ollama)
  PO2XL_MODEL        Override model ID
  PDFIUM_LIB_PATH    Directory containing libpdfium
  RUST_LOG           Override the log filter

  A .env file in the working directory is loaded before anything else.
"#;

/// Extract purchase-order line items from images and PDFs into Excel.
#[derive(Parser, Debug)]
#[command(
    name = "po2xl",
    version,
    about = "Extract purchase-order line items from images and PDFs into Excel",
    long_about = "Send a purchase-order image (JPG/PNG) or PDF to a hosted multimodal model \
with a fixed extraction prompt, show the line items as a table and save them as data.xlsx.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "interactive")]
    inputs: Vec<String>,

    /// Directory the data.xlsx workbook is written to.
    #[arg(short, long, env = "PO2XL_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// LLM model ID (default: gemini-1.5-flash).
    #[arg(long, env = "PO2XL_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "PO2XL_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a replacement extraction prompt.
    #[arg(long, env = "PO2XL_PROMPT")]
    prompt: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PO2XL_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens.
    #[arg(long, env = "PO2XL_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PO2XL_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Model call timeout in seconds (0 disables it).
    #[arg(long, env = "PO2XL_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PO2XL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Declared media type (image/jpeg, image/png, application/pdf) for all inputs.
    #[arg(long, env = "PO2XL_MEDIA_TYPE")]
    media_type: Option<String>,

    /// Output structured JSON instead of a rendered table.
    #[arg(long, env = "PO2XL_JSON")]
    json: bool,

    /// Print the extracted PDF text preview before the table.
    #[arg(long, env = "PO2XL_SHOW_TEXT")]
    show_text: bool,

    /// Do not write data.xlsx.
    #[arg(long, env = "PO2XL_NO_EXPORT")]
    no_export: bool,

    /// Read one path or URL per line from stdin until EOF.
    #[arg(short, long)]
    interactive: bool,

    /// Print document summaries only, no model call.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PO2XL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PO2XL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "PO2XL_QUIET")]
    quiet: bool,
}

fn main() -> ExitCode {
    // Env fallbacks for clap and the API key may live in .env.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; it
    // provides all the feedback that matters to the user.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress(&cli) {
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

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // ── API key ──────────────────────────────────────────────────────────
    // Exported before the runtime starts so no other thread can observe the
    // environment mid-update.
    if !cli.inspect_only && uses_gemini(&cli) {
        let key = api_key_from_env().context("Cannot start without an API key")?;
        std::env::set_var(po2xl::config::GEMINI_API_KEY_VAR, key);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(run_async(cli))
}

async fn run_async(cli: Cli) -> Result<ExitCode> {
    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let mut failed = 0usize;
        for input in &cli.inputs {
            match inspect(input, &config).await {
                Ok(summary) if cli.json => println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
                ),
                Ok(summary) => print_summary(&summary, true),
                Err(e) => {
                    failed += 1;
                    eprintln!("{} {}: {}", red("✗"), input, e);
                }
            }
        }
        return Ok(exit_code(failed));
    }

    // ── Build config and session ─────────────────────────────────────────
    let spinner = if show_progress(&cli) {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let progress = spinner.clone().map(|cb| cb as ProgressCallback);

    let config = build_config(&cli, progress).await?;
    let mut session = ExtractionSession::connect(config)
        .await
        .context("Failed to set up the extraction model")?;

    // With more than one document, each gets its own sub-directory so every
    // workbook keeps the fixed file name.
    let mut dirs = OutputDirs::new(
        cli.output_dir.clone(),
        cli.interactive || cli.inputs.len() > 1,
    );

    let mut failed = 0usize;
    for input in &cli.inputs {
        if !handle(&cli, &mut session, input, &mut dirs).await? {
            failed += 1;
        }
    }

    // ── Interactive mode ─────────────────────────────────────────────────
    if cli.interactive {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            if !cli.quiet {
                eprint!("{} ", cyan("po2xl>"));
                io::stderr().flush().ok();
            }
            let Some(input) = next_input(&mut lines).await? else {
                break;
            };
            if !handle(&cli, &mut session, &input, &mut dirs).await? {
                failed += 1;
            }
        }
    }

    if let Some(ref cb) = spinner {
        cb.finish();
    }

    let stats = session.stats();
    if !cli.quiet && stats.submitted > 1 {
        eprintln!(
            "{}  {}/{} documents extracted",
            if stats.failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&stats.extracted.to_string()),
            stats.submitted,
        );
    }

    Ok(exit_code(failed))
}

/// Submit one document and print its report. Returns `false` on failure.
async fn handle(
    cli: &Cli,
    session: &mut ExtractionSession,
    input: &str,
    dirs: &mut OutputDirs,
) -> Result<bool> {
    let report = session
        .submit_input(input, cli.media_type.as_deref())
        .await;

    match report {
        UploadReport::Extracted(output) => {
            print_output(cli, &output)?;
            if !cli.no_export {
                let dir = dirs.dir_for(input);
                match output.artifact.write_to_dir(&dir).await {
                    Ok(path) => {
                        if !cli.quiet {
                            eprintln!(
                                "{}  {}  {}",
                                green("✔"),
                                bold(&path.display().to_string()),
                                dim(&format!(
                                    "{} tokens in / {} tokens out, {}ms",
                                    output.stats.input_tokens,
                                    output.stats.output_tokens,
                                    output.stats.total_duration_ms
                                )),
                            );
                        }
                    }
                    Err(e) => {
                        eprintln!("{} {}: {}", red("✗"), input, e);
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        }
        UploadReport::Failed(failure) => {
            eprintln!(
                "{} {} ({}):\n{}",
                red("✗"),
                bold(&failure.document),
                failure.kind,
                failure.message
            );
            Ok(false)
        }
    }
}

fn print_output(cli: &Cli, output: &ExtractionOutput) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if !cli.quiet {
        print_summary(&output.summary, cli.show_text);
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(output.table.render().as_bytes())
        .context("Failed to write to stdout")?;
    Ok(())
}

fn print_summary(summary: &DocumentSummary, show_text: bool) {
    println!("{} {}", cyan("◆"), bold(&summary.name));
    println!("  Type:   {}", summary.media_type);
    println!("  Size:   {} bytes", summary.size_bytes);
    if let Some((w, h)) = summary.image_dimensions {
        println!("  Image:  {w} × {h} px");
    }
    if let Some(pages) = summary.page_count {
        println!("  Pages:  {pages}");
    }
    if show_text {
        if let Some(ref preview) = summary.text_preview {
            println!("{}", dim("── extracted text ──"));
            println!("{preview}");
            println!("{}", dim("────────────────────"));
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn show_progress(cli: &Cli) -> bool {
    !cli.quiet && !cli.no_progress && !cli.json && !cli.interactive && !cli.inspect_only
}

fn uses_gemini(cli: &Cli) -> bool {
    cli.provider
        .as_deref()
        .map_or(true, |p| p.eq_ignore_ascii_case("gemini"))
}

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Short name for log lines: the file name of a path, or the last URL segment.
fn display_name(input: &str) -> String {
    input
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(input)
        .to_string()
}

/// Next non-blank line of interactive input, trimmed. `None` at EOF.
async fn next_input<R>(lines: &mut Lines<R>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let input = line.trim();
        if !input.is_empty() {
            return Ok(Some(input.to_string()));
        }
    }
    Ok(None)
}

/// Hands out the directory each document's workbook is written to.
///
/// In per-document mode every document gets `<root>/<stem>`; a stem already
/// used in this run gets `-2`, `-3`, ... appended so no workbook replaces
/// another.
struct OutputDirs {
    root: PathBuf,
    per_document: bool,
    used: HashSet<String>,
}

impl OutputDirs {
    fn new(root: PathBuf, per_document: bool) -> Self {
        Self {
            root,
            per_document,
            used: HashSet::new(),
        }
    }

    fn dir_for(&mut self, input: &str) -> PathBuf {
        if !self.per_document {
            return self.root.clone();
        }
        let stem = document_stem(input);
        let mut name = stem.clone();
        let mut n = 2;
        while !self.used.insert(name.clone()) {
            name = format!("{stem}-{n}");
            n += 1;
        }
        self.root.join(name)
    }
}

/// Sub-directory name for a document's workbook.
fn document_stem(input: &str) -> String {
    let name = display_name(input);
    let name = name.split(['?', '#']).next().unwrap_or(&name).to_string();
    Path::new(&name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_for_paths_and_urls() {
        assert_eq!(document_stem("scans/po_4711.png"), "po_4711");
        assert_eq!(document_stem("https://example.com/po/4711.pdf?dl=1"), "4711");
        assert_eq!(document_stem("C:\\docs\\order.jpeg"), "order");
    }

    #[test]
    fn same_stem_gets_distinct_dirs() {
        let mut dirs = OutputDirs::new(PathBuf::from("out"), true);
        assert_eq!(dirs.dir_for("jan/po.png"), PathBuf::from("out/po"));
        assert_eq!(dirs.dir_for("feb/po.png"), PathBuf::from("out/po-2"));
        assert_eq!(dirs.dir_for("po.pdf"), PathBuf::from("out/po-3"));
        assert_eq!(dirs.dir_for("invoice.pdf"), PathBuf::from("out/invoice"));
    }

    #[test]
    fn suffixed_name_is_not_reused() {
        let mut dirs = OutputDirs::new(PathBuf::from("out"), true);
        assert_eq!(dirs.dir_for("po-2.png"), PathBuf::from("out/po-2"));
        assert_eq!(dirs.dir_for("po.png"), PathBuf::from("out/po"));
        assert_eq!(dirs.dir_for("po.jpg"), PathBuf::from("out/po-3"));
    }

    #[test]
    fn single_document_writes_to_root() {
        let mut dirs = OutputDirs::new(PathBuf::from("out"), false);
        assert_eq!(dirs.dir_for("po.png"), PathBuf::from("out"));
        assert_eq!(dirs.dir_for("po.png"), PathBuf::from("out"));
    }

    #[tokio::test]
    async fn interactive_input_skips_blank_lines() {
        let data: &[u8] = b"  jan/po.png \n\n   \nfeb/po.pdf\n";
        let mut lines = BufReader::new(data).lines();
        assert_eq!(next_input(&mut lines).await.unwrap().as_deref(), Some("jan/po.png"));
        assert_eq!(next_input(&mut lines).await.unwrap().as_deref(), Some("feb/po.pdf"));
        assert_eq!(next_input(&mut lines).await.unwrap(), None);
    }

    #[test]
    fn display_name_keeps_file_name() {
        assert_eq!(display_name("a/b/c.pdf"), "c.pdf");
        assert_eq!(display_name("c.pdf"), "c.pdf");
    }

    #[test]
    fn cli_parses_multiple_inputs() {
        let cli = Cli::try_parse_from(["po2xl", "-o", "out", "a.png", "b.pdf"]).unwrap();
        assert_eq!(cli.inputs, vec!["a.png", "b.pdf"]);
        assert_eq!(cli.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn interactive_needs_no_inputs() {
        assert!(Cli::try_parse_from(["po2xl", "--interactive"]).is_ok());
    }
}
