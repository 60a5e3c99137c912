//! OCR for images embedded in scanned exam pages.
//!
//! Scanned papers usually carry their questions as one raster image per
//! page with an empty or partial text layer, so OCR output is what most
//! exams actually depend on. The engine is a trait so tests and alternative
//! backends can stand in for tesseract.
//!
//! [`TesseractCli`] drives the `tesseract` executable rather than linking
//! libtesseract: the image is PNG-encoded into a temp file and the
//! recognised text is read from stdout.

use image::DynamicImage;
use std::io::{Cursor, Write};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Failure to recognise one image.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("temp file error: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("failed to run '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{binary}' exited with {status}: {stderr}")]
    Failed {
        binary: String,
        status: String,
        stderr: String,
    },
}

/// Turns a raster image into plain text. Called from blocking threads.
pub trait OcrEngine: Send + Sync {
    fn recognise(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// OCR via the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    language: String,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrEngine for TesseractCli {
    fn recognise(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let png = encode_png(image)?;

        let mut file = tempfile::Builder::new()
            .prefix("exam2csv-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(OcrError::TempFile)?;
        file.write_all(&png).map_err(OcrError::TempFile)?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| OcrError::Spawn {
                binary: self.binary.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                binary: self.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(
            "OCR {}x{} image → {} chars",
            image.width(),
            image.height(),
            text.len()
        );
        Ok(text)
    }
}

/// Encode an image as PNG. Lossless, so glyph edges survive for the OCR pass.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
