//! Pipeline entry points.
//!
//! Stage 1 ([`extract_all`]) turns every PDF in `pdf_dir` into text
//! artifacts under `text_dir`. Stage 2 ([`build_csvs`]) groups those
//! artifacts into exams, asks the model for rows and writes the CSVs.
//! [`run`] does both. The stages only share the artifact directory, so
//! either can be re-run on its own.
//!
//! Only directory-level problems are fatal. A bad PDF, an unreadable
//! artifact, a failed model request or an unwritable CSV is recorded in the
//! report and the batch carries on.

use crate::config::{Granularity, PipelineConfig};
use crate::error::{ExamCsvError, UnitError};
use crate::output::{CsvSummary, ExamReport, ExtractionSummary, RunReport};
use crate::pipeline::chunk::chunk_pages;
use crate::pipeline::extract::{extract_pdf, list_pdfs};
use crate::pipeline::group::{discover_groups, ExamGroup};
use crate::pipeline::llm::{extract_rows, resolve_model, PageInput, RowsModel};
use crate::pipeline::merge::{write_combined_csv, write_exam_csv, COMBINED_FILE_NAME};
use crate::pipeline::ocr::{OcrEngine, TesseractCli};
use crate::pipeline::pdfium::{PageSource, PdfiumSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stage 1: extract every PDF in `config.pdf_dir` into `config.text_dir`.
///
/// # Errors
/// Fails only when the PDF directory is missing or unreadable, or the
/// artifact directory cannot be created. Individual PDFs that cannot be
/// read are skipped and reported in the summary.
pub async fn extract_all(config: &PipelineConfig) -> Result<ExtractionSummary, ExamCsvError> {
    let pdf_dir = &config.pdf_dir;
    if !pdf_dir.is_dir() {
        return Err(ExamCsvError::DirectoryNotFound {
            path: pdf_dir.clone(),
        });
    }

    let pdfs = list_pdfs(pdf_dir).map_err(|e| ExamCsvError::DirectoryUnreadable {
        path: pdf_dir.clone(),
        source: e,
    })?;
    info!("Found {} PDFs in {}", pdfs.len(), pdf_dir.display());

    tokio::fs::create_dir_all(&config.text_dir)
        .await
        .map_err(|e| ExamCsvError::OutputWriteFailed {
            path: config.text_dir.clone(),
            source: e,
        })?;

    let source = page_source(config);

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(pdfs.len());
    }

    let mut summary = ExtractionSummary::default();
    for pdf in &pdfs {
        let outcome = extract_pdf(&source, pdf, config).await;

        if let Some(ref cb) = config.progress_callback {
            let name = pdf
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            match &outcome.error {
                None => cb.on_pdf_complete(&name, outcome.pages),
                Some(e) => cb.on_pdf_skipped(&name, &e.to_string()),
            }
        }

        summary.pdfs.push(outcome);
    }

    info!(
        "Extraction complete: {} processed, {} skipped, {} artifacts",
        summary.processed(),
        summary.skipped(),
        summary.artifacts()
    );
    Ok(summary)
}

/// The configured PDF backend, or pdfium with tesseract OCR when OCR is on.
fn page_source(config: &PipelineConfig) -> Arc<dyn PageSource> {
    if let Some(ref source) = config.page_source {
        return Arc::clone(source);
    }
    let ocr: Option<Arc<dyn OcrEngine>> = if config.ocr_enabled {
        Some(Arc::new(TesseractCli::new(
            config.ocr_binary.as_str(),
            config.ocr_language.as_str(),
        )))
    } else {
        None
    };
    Arc::new(PdfiumSource::new(ocr))
}

/// Run one exam group through the model.
///
/// Unreadable artifacts are logged and stand in as blank pages, so they are
/// never sent but chunk `k` still covers the same pages. No files are
/// written here; [`build_csvs`] writes the CSV once the whole exam is done.
pub async fn process_exam(
    model: &Arc<dyn RowsModel>,
    group: &ExamGroup,
    config: &PipelineConfig,
) -> ExamReport {
    let exam_id = group.exam_id.as_str();
    info!("Processing exam {} ({} pages)", exam_id, group.pages.len());

    let mut pages = Vec::with_capacity(group.pages.len());
    let mut read_errors = Vec::new();
    for artifact in &group.pages {
        match artifact.read_text().await {
            Ok(text) => pages.push(PageInput::new(artifact.page_num, text)),
            Err(e) => {
                let error = UnitError::ArtifactReadFailed {
                    path: artifact.path.clone(),
                    detail: e.to_string(),
                };
                warn!("{}", error);
                read_errors.push(error);
                pages.push(PageInput::new(artifact.page_num, String::new()));
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_exam_start(exam_id, planned_units(&pages, config));
    }

    let units = extract_rows(model, exam_id, &pages, config).await;

    let report = ExamReport {
        exam_id: exam_id.to_string(),
        pages: group.pages.len(),
        units,
        read_errors,
        csv_path: None,
        csv_error: None,
    };

    debug!(
        "{}: {} units, {} failed, {} rows",
        exam_id,
        report.units.len(),
        report.failed_units(),
        report.row_count()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_exam_complete(exam_id, report.row_count());
    }

    report
}

/// Number of requests [`extract_rows`] will make for these pages.
fn planned_units(pages: &[PageInput], config: &PipelineConfig) -> usize {
    let filled = |p: &PageInput| !p.text.trim().is_empty();
    match config.granularity {
        Granularity::Page => pages.iter().filter(|&p| filled(p)).count(),
        Granularity::Chunk => chunk_pages(pages, config.max_pages_per_chunk)
            .iter()
            .filter(|chunk| chunk.iter().any(filled))
            .count(),
    }
}

/// Stage 2: turn the artifacts in `config.text_dir` into CSVs in `config.csv_dir`.
///
/// The model is only resolved when there is at least one exam, so an empty
/// artifact directory needs no API key.
///
/// An exam whose CSV cannot be written is logged, recorded on its report
/// and left out of the combined file.
///
/// # Errors
/// Fails when the artifact directory cannot be listed or no model provider
/// is configured.
pub async fn build_csvs(config: &PipelineConfig) -> Result<CsvSummary, ExamCsvError> {
    let groups = discover_groups(&config.text_dir).await?;
    if groups.is_empty() {
        info!("No text artifacts found in {}", config.text_dir.display());
        return Ok(CsvSummary::default());
    }
    info!("Found {} exams to process", groups.len());

    let model = resolve_model(config)?;

    let mut summary = CsvSummary::default();
    let mut saved_rows: Vec<Vec<String>> = Vec::new();

    for group in &groups {
        let mut report = process_exam(&model, group, config).await;

        if report.row_count() == 0 {
            info!("No data for {}", report.exam_id);
        } else {
            let rows: Vec<String> = report.rows().map(str::to_string).collect();
            match write_exam_csv(&config.csv_dir, &report.exam_id, &rows) {
                Ok(path) => {
                    report.csv_path = Some(path);
                    saved_rows.push(rows);
                }
                Err(e) => {
                    let fallback = config.csv_dir.join(format!("{}.csv", report.exam_id));
                    let error = csv_write_error(e, fallback);
                    warn!("Skipping {}: {}", report.exam_id, error);
                    report.csv_error = Some(error);
                }
            }
        }

        summary.exams.push(report);
    }

    if !saved_rows.is_empty() {
        match write_combined_csv(&config.csv_dir, saved_rows.iter().map(Vec::as_slice)) {
            Ok((path, count)) => {
                summary.combined_path = Some(path);
                summary.combined_rows = count;
            }
            Err(e) => {
                let fallback = config.csv_dir.join(COMBINED_FILE_NAME);
                let error = csv_write_error(e, fallback);
                warn!("{}", error);
                summary.combined_error = Some(error);
            }
        }
    }

    info!(
        "CSV build complete: {}/{} exams saved, {} rows, {} input / {} output tokens",
        summary.saved_exams(),
        summary.exams.len(),
        summary.combined_rows,
        summary.total_input_tokens(),
        summary.total_output_tokens()
    );
    Ok(summary)
}

fn csv_write_error(error: ExamCsvError, fallback: PathBuf) -> UnitError {
    match error {
        ExamCsvError::OutputWriteFailed { path, source } => UnitError::CsvWriteFailed {
            path,
            detail: source.to_string(),
        },
        other => UnitError::CsvWriteFailed {
            path: fallback,
            detail: other.to_string(),
        },
    }
}

/// Run stage 1 then stage 2.
pub async fn run(config: &PipelineConfig) -> Result<RunReport, ExamCsvError> {
    let start = Instant::now();
    let extraction = extract_all(config).await?;
    let csv = build_csvs(config).await?;
    Ok(RunReport {
        extraction,
        csv,
        total_duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(config: &PipelineConfig) -> Result<RunReport, ExamCsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExamCsvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(config))
}
