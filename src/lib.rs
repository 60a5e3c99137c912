//! # exam2csv
//!
//! Turn folders of exam-paper PDFs into question CSVs with OCR and a
//! language model.
//!
//! ## Why this crate?
//!
//! Old exam papers are mostly scans: a thin text layer at best, and the
//! questions themselves locked in page images. This crate pulls out whatever
//! text pdfium can find, OCRs the embedded images with tesseract, and asks a
//! language model to rewrite each exam as one CSV row per question:
//!
//! ```text
//! question,marks,paper_title,filename,page,year
//! ```
//!
//! ## Pipeline Overview
//!
//! ```text
//! ./pdfs/*.pdf
//!  │
//!  ├─ 1. Extract  text layer + tesseract OCR per page (spawn_blocking)
//!  │             → ./txt_outputs/{exam}_page_{n}.txt
//!  ├─ 2. Group    artifacts by exam, pages in numeric order
//!  ├─ 3. Chunk    ≤ 8 pages per request (or one request per page)
//!  ├─ 4. Rows     model call per chunk/page, failures recorded not raised
//!  ├─ 5. Validate drop fences, echoed headers and prose
//!  └─ 6. Merge    ./csv_outputs/{exam}.csv + all_exams_combined.csv
//! ```
//!
//! The two stages only share the text directory, so the text can be
//! inspected or hand-corrected before the (paid) model stage runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exam2csv::{run, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::builder()
//!         .pdf_dir("pdfs")
//!         .csv_dir("csv_outputs")
//!         .build()?;
//!     let report = run(&config).await?;
//!     eprintln!(
//!         "{} exams, {} rows",
//!         report.csv.saved_exams(),
//!         report.csv.combined_rows
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam2csv` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! exam2csv = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! - `libpdfium`, found via `PDFIUM_LIB_PATH` or the system loader
//! - the `tesseract` executable, unless OCR is disabled
//! - an API key for the chosen provider (stage 2 only)

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ArtifactLayout, Granularity, PipelineConfig, PipelineConfigBuilder, ValidationMode,
};
pub use error::{ExamCsvError, UnitError};
pub use output::{
    CsvSummary, ExamReport, ExtractionSummary, PdfOutcome, RunReport, UnitId, UnitResult,
};
pub use pipeline::group::{ExamGroup, PageArtifact};
pub use pipeline::llm::{PageInput, ProviderModel, RowsModel, RowsRequest, RowsResponse};
pub use pipeline::ocr::{OcrEngine, TesseractCli};
pub use pipeline::pdfium::{PageSource, PageText, PdfiumSource};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{build_csvs, extract_all, process_exam, run, run_sync};
