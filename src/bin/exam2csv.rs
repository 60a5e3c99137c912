//! CLI binary for exam2csv.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one or both stages and prints a summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use exam2csv::{
    build_csvs, extract_all, run, ArtifactLayout, CsvSummary, ExtractionSummary, Granularity,
    PipelineConfig, PipelineProgressCallback, ProgressCallback, ValidationMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar that counts PDFs during extraction and then
/// requests for each exam, with a log line per item above it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Request start times keyed by `"{exam_id} {unit}"`.
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, prefix: &str, total: usize, noun: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {noun}  ⏱ {{elapsed_precise}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_position(0);
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix.to_string());
        self.bar.reset_eta();
    }

    fn elapsed(&self, exam_id: &str, unit: &str) -> String {
        let secs = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&format!("{exam_id} {unit}")))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pdfs: usize) {
        self.activate_bar("Extracting", total_pdfs, "PDFs");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting text from {total_pdfs} PDFs…"))
        ));
    }

    fn on_pdf_complete(&self, pdf_name: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {:<40}  {}",
            green("✓"),
            pdf_name,
            dim(&format!("{pages} pages"))
        ));
        self.bar.inc(1);
    }

    fn on_pdf_skipped(&self, pdf_name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {:<40}  {}", red("✗"), pdf_name, red(&truncate(error))));
        self.bar.inc(1);
    }

    fn on_exam_start(&self, exam_id: &str, units: usize) {
        self.activate_bar(exam_id, units, "requests");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{exam_id}: {units} requests"))
        ));
    }

    fn on_unit_start(&self, exam_id: &str, unit: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(format!("{exam_id} {unit}"), Instant::now());
        }
        self.bar.set_message(unit.to_string());
    }

    fn on_unit_complete(&self, exam_id: &str, unit: &str, rows: usize) {
        self.bar.println(format!(
            "  {} {:<10}  {:<10}  {}",
            green("✓"),
            unit,
            dim(&format!("{rows:>3} rows")),
            self.elapsed(exam_id, unit)
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, exam_id: &str, unit: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<10}  {}  {}",
            red("✗"),
            unit,
            red(&truncate(error)),
            self.elapsed(exam_id, unit)
        ));
        self.bar.inc(1);
    }

    fn on_exam_complete(&self, exam_id: &str, rows: usize) {
        let mark = if rows == 0 { cyan("⚠") } else { green("✔") };
        self.bar
            .println(format!("{} {} {}", mark, exam_id, dim(&format!("{rows} rows"))));
    }
}

/// Keep long error messages to one terminal line.
fn truncate(msg: &str) -> String {
    let first_line = msg.lines().next().unwrap_or_default();
    if first_line.chars().count() > 80 {
        let cut: String = first_line.chars().take(79).collect();
        format!("{cut}\u{2026}")
    } else {
        first_line.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run with default folders (./pdfs → ./txt_outputs → ./csv_outputs)
  exam2csv run

  # Stage 1 only: PDFs to per-page text files, no API key needed
  exam2csv extract --pdf-dir scans --text-dir txt

  # Stage 2 only: one request per page, three at a time
  exam2csv rows --granularity page --concurrency 3

  # Specific provider and model
  exam2csv run --provider anthropic --model claude-3-5-haiku-latest

  # Machine-readable report
  exam2csv run --json > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (also read from .env)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model used with EDGEQUAKE_LLM_PROVIDER
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter, overrides --verbose / --quiet

SETUP:
  1. Install pdfium and tesseract (e.g. apt install tesseract-ocr).
  2. Set API key:   export OPENAI_API_KEY=sk-...
  3. Run:           exam2csv run
"#;

/// Turn exam-paper PDFs into question CSVs.
#[derive(Parser, Debug)]
#[command(
    name = "exam2csv",
    version,
    about = "Turn exam-paper PDFs into question CSVs using OCR and a language model",
    long_about = "Extract the text of every exam-paper PDF in a folder (text layer plus \
OCR of scanned images), group the pages by exam and ask a language model to list every \
question as a CSV row: question, marks, paper title, file name, page and year.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder for the text files: stage 1 output, stage 2 input.
    #[arg(long, global = true, env = "EXAM2CSV_TEXT_DIR", default_value = "./txt_outputs")]
    text_dir: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage 1: write each PDF page out as a text file.
    Extract {
        #[command(flatten)]
        extract: ExtractArgs,
    },
    /// Stage 2: turn text files into per-exam and combined CSVs.
    Rows {
        #[command(flatten)]
        rows: RowsArgs,
    },
    /// Both stages, one after the other.
    Run {
        #[command(flatten)]
        extract: ExtractArgs,
        #[command(flatten)]
        rows: RowsArgs,
    },
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Folder holding the input PDFs.
    #[arg(long, env = "EXAM2CSV_PDF_DIR", default_value = "./pdfs")]
    pdf_dir: PathBuf,

    /// Write one text file per PDF with page markers instead of one per page.
    #[arg(long, env = "EXAM2CSV_COMBINED_TEXT")]
    combined_text: bool,

    /// Skip OCR of embedded images.
    #[arg(long, env = "EXAM2CSV_NO_OCR")]
    no_ocr: bool,

    /// Tesseract executable.
    #[arg(long, env = "EXAM2CSV_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language code(s), e.g. eng or eng+fra.
    #[arg(long, env = "EXAM2CSV_OCR_LANG", default_value = "eng")]
    ocr_lang: String,
}

#[derive(Args, Debug)]
struct RowsArgs {
    /// Folder for the CSV outputs.
    #[arg(long, env = "EXAM2CSV_CSV_DIR", default_value = "./csv_outputs")]
    csv_dir: PathBuf,

    /// LLM model ID (default: gpt-4o-mini).
    #[arg(long, env = "EXAM2CSV_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EXAM2CSV_PROVIDER")]
    provider: Option<String>,

    /// One request per chunk of pages, or one per page.
    #[arg(long, env = "EXAM2CSV_GRANULARITY", value_enum, default_value = "chunk")]
    granularity: GranularityArg,

    /// Maximum pages per request in chunk mode.
    #[arg(long, env = "EXAM2CSV_CHUNK_PAGES", default_value_t = 8,
          value_parser = clap::value_parser!(u32).range(1..))]
    chunk_pages: u32,

    /// Concurrent requests in page mode.
    #[arg(short, long, env = "EXAM2CSV_CONCURRENCY", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    concurrency: u32,

    /// Max LLM output tokens per request.
    #[arg(long, env = "EXAM2CSV_MAX_TOKENS", default_value_t = 3000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "EXAM2CSV_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "EXAM2CSV_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Require every row to parse as exactly six CSV fields.
    #[arg(long, env = "EXAM2CSV_STRICT")]
    strict: bool,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Print the run report as JSON on stdout.
    #[arg(long, global = true, env = "EXAM2CSV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "EXAM2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "EXAM2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "EXAM2CSV_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum GranularityArg {
    Chunk,
    Page,
}

impl From<GranularityArg> for Granularity {
    fn from(v: GranularityArg) -> Self {
        match v {
            GranularityArg::Chunk => Granularity::Chunk,
            GranularityArg::Page => Granularity::Page,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; keys may come from the real environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let out = &cli.output;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !out.quiet && !out.no_progress && !out.json;
    let filter = if out.verbose {
        "debug"
    } else if out.quiet || show_progress {
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

    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let progress_cb: Option<ProgressCallback> = progress
        .as_ref()
        .map(|cb| Arc::clone(cb) as Arc<dyn PipelineProgressCallback>);

    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let (extraction, csv, json) = match cli.command {
        Command::Extract { .. } => {
            let summary = extract_all(&config).await.context("Extraction failed")?;
            let json = to_json(&summary)?;
            (Some(summary), None, json)
        }
        Command::Rows { .. } => {
            let summary = build_csvs(&config).await.context("CSV build failed")?;
            let json = to_json(&summary)?;
            (None, Some(summary), json)
        }
        Command::Run { .. } => {
            let report = run(&config).await.context("Pipeline run failed")?;
            let json = to_json(&report)?;
            (Some(report.extraction), Some(report.csv), json)
        }
    };

    if let Some(ref cb) = progress {
        cb.finish();
    }

    if out.json {
        println!("{json}");
    } else if !out.quiet {
        if let Some(ref summary) = extraction {
            print_extraction(summary, &config);
        }
        if let Some(ref summary) = csv {
            print_csv(summary);
        }
        if let Some(ref cb) = progress {
            let errors = cb.errors.load(Ordering::SeqCst);
            if errors > 0 {
                eprintln!("   {} problems reported above", red(&errors.to_string()));
            }
        }
    }

    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialise report")
}

fn print_extraction(summary: &ExtractionSummary, config: &PipelineConfig) {
    eprintln!(
        "{}  {} PDFs extracted, {} skipped  →  {}",
        if summary.skipped() == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        summary.processed(),
        summary.skipped(),
        bold(&config.text_dir.display().to_string()),
    );
    for pdf in summary.pdfs.iter().filter(|p| p.is_skipped()) {
        if let Some(ref e) = pdf.error {
            eprintln!("   {} {}", red("✗"), truncate(&e.to_string()));
        }
    }
}

fn print_csv(summary: &CsvSummary) {
    for exam in &summary.exams {
        match (&exam.csv_path, &exam.csv_error) {
            (Some(path), _) => eprintln!(
                "   {} {:<30} {:>4} rows  →  {}",
                green("✓"),
                exam.exam_id,
                exam.row_count(),
                dim(&path.display().to_string())
            ),
            (None, Some(e)) => eprintln!("   {} {}", red("✗"), truncate(&e.to_string())),
            (None, None) => eprintln!("   {} {:<30} no data", cyan("⚠"), exam.exam_id),
        }
    }
    match (&summary.combined_path, &summary.combined_error) {
        (Some(path), _) => eprintln!(
            "{}  {} rows from {}/{} exams  →  {}",
            green("✔"),
            summary.combined_rows,
            summary.saved_exams(),
            summary.exams.len(),
            bold(&path.display().to_string()),
        ),
        (None, Some(e)) => eprintln!("{}  {}", red("✗"), truncate(&e.to_string())),
        (None, None) => eprintln!("{}  no CSV rows produced", cyan("⚠")),
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&summary.total_input_tokens().to_string()),
        dim(&summary.total_output_tokens().to_string()),
    );
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder().text_dir(&cli.text_dir);

    let (extract, rows) = match &cli.command {
        Command::Extract { extract } => (Some(extract), None),
        Command::Rows { rows } => (None, Some(rows)),
        Command::Run { extract, rows } => (Some(extract), Some(rows)),
    };

    if let Some(rows) = rows {
        builder = builder
            .csv_dir(&rows.csv_dir)
            .granularity(rows.granularity.into())
            .max_pages_per_chunk(rows.chunk_pages as usize)
            .concurrency(rows.concurrency as usize)
            .max_tokens(rows.max_tokens)
            .temperature(rows.temperature)
            .validation(if rows.strict {
                ValidationMode::Strict
            } else {
                ValidationMode::Heuristic
            });

        if let Some(ref model) = rows.model {
            builder = builder.model(model);
        }
        if let Some(ref provider) = rows.provider {
            builder = builder.provider_name(provider);
        }
        if let Some(ref path) = rows.system_prompt {
            let prompt = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
            builder = builder.system_prompt(prompt);
        }
    }

    if let Some(extract) = extract {
        builder = builder
            .pdf_dir(&extract.pdf_dir)
            .layout(if extract.combined_text {
                ArtifactLayout::Combined
            } else {
                ArtifactLayout::PerPage
            })
            .ocr_enabled(!extract.no_ocr)
            .ocr_binary(&extract.tesseract)
            .ocr_language(&extract.ocr_lang);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_subcommand_maps_onto_config() {
        let cli = Cli::try_parse_from([
            "exam2csv",
            "run",
            "--pdf-dir",
            "in",
            "--text-dir",
            "txt",
            "--csv-dir",
            "out",
            "--granularity",
            "page",
            "--concurrency",
            "5",
            "--no-ocr",
            "--strict",
        ])
        .unwrap();
        let config = tokio_test::block_on(build_config(&cli, None)).unwrap();
        assert_eq!(config.pdf_dir, PathBuf::from("in"));
        assert_eq!(config.text_dir, PathBuf::from("txt"));
        assert_eq!(config.csv_dir, PathBuf::from("out"));
        assert_eq!(config.granularity, Granularity::Page);
        assert_eq!(config.concurrency, 5);
        assert!(!config.ocr_enabled);
        assert_eq!(config.validation, ValidationMode::Strict);
    }

    #[test]
    fn truncate_keeps_first_line() {
        assert_eq!(truncate("one\ntwo"), "one");
        assert_eq!(truncate(&"x".repeat(100)).chars().count(), 80);
    }
}
