//! Stage 1: write each PDF's pages out as text artifacts.
//!
//! Artifacts are the hand-off to stage 2 and are never rewritten by it.
//! With [`ArtifactLayout::PerPage`] each page becomes
//! `{pdf_stem}_page_{n}.txt`, the naming convention the grouper relies on.
//! With [`ArtifactLayout::Combined`] each document becomes one
//! `{pdf_stem}.txt` with `--- Page N ---` markers inside.
//!
//! A PDF is written out only after every page has been read, so a document
//! that fails part-way leaves nothing behind in the artifact directory.

use crate::config::{ArtifactLayout, PipelineConfig};
use crate::error::UnitError;
use crate::output::PdfOutcome;
use crate::pipeline::pdfium::{PageSource, PageText};
use crate::prompts::page_marker;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extract one PDF into the artifact directory.
///
/// Never fails: every problem is reported in the returned [`PdfOutcome`]
/// and the caller moves on to the next PDF.
pub async fn extract_pdf(
    source: &Arc<dyn PageSource>,
    pdf_path: &Path,
    config: &PipelineConfig,
) -> PdfOutcome {
    let skipped = |error: UnitError| {
        warn!("Skipping {}: {}", pdf_path.display(), error);
        PdfOutcome {
            pdf: pdf_path.to_path_buf(),
            pages: 0,
            artifacts: Vec::new(),
            error: Some(error),
        }
    };

    if let Err(e) = check_pdf_magic(pdf_path) {
        return skipped(e);
    }

    let path = pdf_path.to_path_buf();
    let src = Arc::clone(source);
    let pages = match tokio::task::spawn_blocking(move || src.read_pages(&path)).await {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            return skipped(UnitError::PdfOpenFailed {
                path: pdf_path.to_path_buf(),
                detail: e.to_string(),
            })
        }
        Err(e) => {
            return skipped(UnitError::PdfOpenFailed {
                path: pdf_path.to_path_buf(),
                detail: format!("reader task panicked: {e}"),
            })
        }
    };

    let stem = pdf_stem(pdf_path);
    let files = render_artifacts(&stem, &pages, config.layout);

    let mut artifacts = Vec::with_capacity(files.len());
    for (name, body) in files {
        let target = config.text_dir.join(&name);
        if let Err(e) = tokio::fs::write(&target, body).await {
            // A skipped PDF must not feed a partial exam into stage 2.
            for written in &artifacts {
                let _ = tokio::fs::remove_file(written).await;
            }
            return skipped(UnitError::ArtifactWriteFailed {
                path: target,
                detail: e.to_string(),
            });
        }
        debug!("Wrote {}", target.display());
        artifacts.push(target);
    }

    info!(
        "Processed: {} ({} pages, {} artifacts)",
        stem,
        pages.len(),
        artifacts.len()
    );

    PdfOutcome {
        pdf: pdf_path.to_path_buf(),
        pages: pages.len(),
        artifacts,
        error: None,
    }
}

/// Artifact file names and bodies for one document, in page order.
pub fn render_artifacts(
    stem: &str,
    pages: &[PageText],
    layout: ArtifactLayout,
) -> Vec<(String, String)> {
    match layout {
        ArtifactLayout::PerPage => pages
            .iter()
            .map(|p| (format!("{stem}_page_{}.txt", p.page_num), p.combined()))
            .collect(),
        ArtifactLayout::Combined => {
            if pages.is_empty() {
                return Vec::new();
            }
            let body = pages
                .iter()
                .map(|p| format!("\n\n{}\n{}", page_marker(p.page_num), p.combined()))
                .collect::<Vec<_>>()
                .join("\n");
            vec![(format!("{stem}.txt"), body)]
        }
    }
}

/// List `*.pdf` files (any extension case) in `dir`, sorted by file name.
pub fn list_pdfs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

/// The PDF's base name without extension.
pub fn pdf_stem(pdf_path: &Path) -> String {
    pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string())
}

/// Reject files that do not start with `%PDF` before pdfium sees them.
fn check_pdf_magic(path: &Path) -> Result<(), UnitError> {
    let mut file = std::fs::File::open(path).map_err(|e| UnitError::PdfOpenFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) if &magic == b"%PDF" => Ok(()),
        Ok(()) => Err(UnitError::NotAPdf {
            path: path.to_path_buf(),
            magic: magic.to_vec(),
        }),
        Err(e) => Err(UnitError::PdfOpenFailed {
            path: path.to_path_buf(),
            detail: format!("file too short: {e}"),
        }),
    }
}
