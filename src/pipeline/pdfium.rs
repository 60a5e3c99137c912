//! PDF reading: per-page text layer plus OCR of embedded images.
//!
//! ## Why a trait?
//!
//! pdfium is a native library that has to be present at runtime. Putting
//! the PDF backend behind [`PageSource`] keeps the rest of the pipeline
//! testable without it and leaves room for other backends.
//!
//! ## Why blocking?
//!
//! pdfium keeps thread-local state and is not async-safe, and tesseract is
//! an external process. [`crate::pipeline::extract`] calls
//! [`PageSource::read_pages`] from `spawn_blocking` so Tokio workers never
//! stall on a large scan.

use crate::error::ExamCsvError;
use crate::pipeline::ocr::OcrEngine;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text recovered from one PDF page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Native text layer.
    pub text_layer: String,
    /// OCR output for each embedded image that produced text, in object order.
    pub ocr_texts: Vec<String>,
}

impl PageText {
    /// The artifact body: text layer, then OCR text after a blank line.
    pub fn combined(&self) -> String {
        let mut text = self.text_layer.trim().to_string();
        let ocr: Vec<&str> = self
            .ocr_texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !ocr.is_empty() {
            text.push_str("\n\n");
            text.push_str(&ocr.join("\n\n"));
        }
        text
    }
}

/// Reads every page of a PDF. Implementations may block.
pub trait PageSource: Send + Sync {
    fn read_pages(&self, pdf_path: &Path) -> Result<Vec<PageText>, ExamCsvError>;
}

/// [`PageSource`] backed by pdfium, with optional OCR of image objects.
pub struct PdfiumSource {
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl PdfiumSource {
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { ocr }
    }
}

impl PageSource for PdfiumSource {
    fn read_pages(&self, pdf_path: &Path) -> Result<Vec<PageText>, ExamCsvError> {
        let pdfium = bind_pdfium()?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| ExamCsvError::PdfOpenFailed {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        info!("PDF loaded: {} ({} pages)", pdf_path.display(), pages.len());

        let mut results = Vec::with_capacity(pages.len() as usize);

        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;

            let text_layer = match page.text() {
                Ok(text) => text.all(),
                Err(e) => {
                    warn!("Page {}: no text layer ({:?})", page_num, e);
                    String::new()
                }
            };

            let mut ocr_texts = Vec::new();
            if let Some(ref engine) = self.ocr {
                for object in page.objects().iter() {
                    let Some(image_object) = object.as_image_object() else {
                        continue;
                    };
                    let image = match image_object.get_raw_image() {
                        Ok(image) => image,
                        Err(e) => {
                            warn!("Page {}: could not decode embedded image ({:?})", page_num, e);
                            continue;
                        }
                    };
                    match engine.recognise(&image) {
                        Ok(text) if !text.trim().is_empty() => ocr_texts.push(text),
                        Ok(_) => {}
                        Err(e) => warn!("Page {}: OCR failed: {}", page_num, e),
                    }
                }
            }

            debug!(
                "Page {}: {} chars text layer, {} OCR blocks",
                page_num,
                text_layer.len(),
                ocr_texts.len()
            );

            results.push(PageText {
                page_num,
                text_layer,
                ocr_texts,
            });
        }

        Ok(results)
    }
}

/// Bind to libpdfium: `PDFIUM_LIB_PATH` (a directory) first, then the system library.
fn bind_pdfium() -> Result<Pdfium, ExamCsvError> {
    if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
        if !dir.is_empty() {
            let lib_path = Pdfium::pdfium_platform_library_name_at_path(&dir);
            match Pdfium::bind_to_library(&lib_path) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(e) => warn!(
                    "PDFIUM_LIB_PATH={} could not be loaded ({:?}); trying system library",
                    dir, e
                ),
            }
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| ExamCsvError::PdfiumBindingFailed(format!("{:?}", e)))
}
