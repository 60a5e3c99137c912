//! Error types for the exam2csv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExamCsvError`] — **Fatal**: the run cannot proceed at all (input
//!   directory missing, provider not configured, artifact directory not
//!   creatable).
//!   Returned as `Err(ExamCsvError)` from the top-level entry points in
//!   [`crate::run`].
//!
//! * [`UnitError`] — **Non-fatal**: one PDF, one text artifact, one CSV
//!   file or one language-model request failed, but the rest of the batch
//!   is fine. Stored inside the report types in [`crate::output`] so the
//!   run report shows exactly what was skipped.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the exam2csv library.
///
/// Per-PDF and per-request failures use [`UnitError`] and are stored in the
/// run report rather than propagated here.
#[derive(Debug, Error)]
pub enum ExamCsvError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// An input directory does not exist.
    #[error("Directory not found: '{path}'\nCheck the path exists and is readable.")]
    DirectoryNotFound { path: PathBuf },

    /// An input directory exists but could not be listed.
    #[error("Failed to read directory '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF backend could not open or parse a document.
    #[error("PDF '{path}' could not be opened: {detail}")]
    PdfOpenFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install\n\
pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single PDF, artifact, or model request.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The file does not start with the `%PDF` magic bytes.
    #[error("'{path}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// The PDF backend refused the document.
    #[error("Failed to open '{path}': {detail}")]
    PdfOpenFailed { path: PathBuf, detail: String },

    /// A text artifact could not be written.
    #[error("Failed to write artifact '{path}': {detail}")]
    ArtifactWriteFailed { path: PathBuf, detail: String },

    /// A text artifact could not be read back.
    #[error("Failed to read artifact '{path}': {detail}")]
    ArtifactReadFailed { path: PathBuf, detail: String },

    /// An exam's CSV, or the combined CSV, could not be written.
    #[error("Failed to write CSV '{path}': {detail}")]
    CsvWriteFailed { path: PathBuf, detail: String },

    /// The language-model request for one chunk or page failed.
    #[error("{exam_id} {unit}: LLM call failed: {detail}")]
    LlmFailed {
        exam_id: String,
        unit: String,
        detail: String,
    },
}
