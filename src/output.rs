//! Report types returned by the pipeline stages.
//!
//! Every stage returns a plain serialisable record of what it did, so the
//! CLI can print a summary or dump the whole run as JSON with `--json`.

use crate::error::UnitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of one language-model request within an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitId {
    /// 1-indexed chunk number.
    Chunk(usize),
    /// Page number taken from the artifact name.
    Page(usize),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Chunk(n) => write!(f, "chunk {n}"),
            UnitId::Page(n) => write!(f, "page {n}"),
        }
    }
}

/// What stage 1 did with one PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfOutcome {
    pub pdf: PathBuf,
    /// Pages read from the document (0 when skipped).
    pub pages: usize,
    /// Text artifacts written for this PDF.
    pub artifacts: Vec<PathBuf>,
    /// Why the PDF was skipped, if it was.
    pub error: Option<UnitError>,
}

impl PdfOutcome {
    pub fn is_skipped(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate result of stage 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub pdfs: Vec<PdfOutcome>,
}

impl ExtractionSummary {
    pub fn processed(&self) -> usize {
        self.pdfs.iter().filter(|p| !p.is_skipped()).count()
    }

    pub fn skipped(&self) -> usize {
        self.pdfs.iter().filter(|p| p.is_skipped()).count()
    }

    pub fn artifacts(&self) -> usize {
        self.pdfs.iter().map(|p| p.artifacts.len()).sum()
    }
}

/// Result of one language-model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitResult {
    pub unit: UnitId,
    /// Pages covered by the request, in order.
    pub pages: Vec<usize>,
    /// Raw model output (not serialised; it can be large).
    #[serde(skip)]
    pub raw: String,
    /// Lines that survived validation, verbatim.
    pub rows: Vec<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub error: Option<UnitError>,
}

impl UnitResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// What stage 2 did with one exam group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamReport {
    pub exam_id: String,
    /// Artifacts in the group.
    pub pages: usize,
    /// Requests in chunk/page order.
    pub units: Vec<UnitResult>,
    /// Artifacts that could not be read.
    pub read_errors: Vec<UnitError>,
    /// Per-exam CSV, when one was written.
    pub csv_path: Option<PathBuf>,
    /// Why the exam's CSV could not be written.
    #[serde(default)]
    pub csv_error: Option<UnitError>,
}

impl ExamReport {
    /// All accepted rows in unit order.
    pub fn rows(&self) -> impl Iterator<Item = &str> {
        self.units
            .iter()
            .flat_map(|u| u.rows.iter().map(String::as_str))
    }

    pub fn row_count(&self) -> usize {
        self.units.iter().map(|u| u.rows.len()).sum()
    }

    pub fn failed_units(&self) -> usize {
        self.units.iter().filter(|u| u.is_failed()).count()
    }

    pub fn is_saved(&self) -> bool {
        self.csv_path.is_some()
    }
}

/// Aggregate result of stage 2.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvSummary {
    pub exams: Vec<ExamReport>,
    pub combined_path: Option<PathBuf>,
    pub combined_rows: usize,
    /// Why the combined CSV could not be written.
    #[serde(default)]
    pub combined_error: Option<UnitError>,
}

impl CsvSummary {
    pub fn saved_exams(&self) -> usize {
        self.exams.iter().filter(|e| e.is_saved()).count()
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.exams
            .iter()
            .flat_map(|e| &e.units)
            .map(|u| u.input_tokens as u64)
            .sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.exams
            .iter()
            .flat_map(|e| &e.units)
            .map(|u| u.output_tokens as u64)
            .sum()
    }
}

/// Both stages of a full run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub extraction: ExtractionSummary,
    pub csv: CsvSummary,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(unit: UnitId, rows: &[&str], failed: bool) -> UnitResult {
        UnitResult {
            unit,
            pages: vec![],
            raw: String::new(),
            rows: rows.iter().map(|r| r.to_string()).collect(),
            input_tokens: 10,
            output_tokens: 5,
            duration_ms: 1,
            error: failed.then(|| UnitError::LlmFailed {
                exam_id: "EX".into(),
                unit: unit.to_string(),
                detail: "boom".into(),
            }),
        }
    }

    #[test]
    fn unit_id_display() {
        assert_eq!(UnitId::Chunk(2).to_string(), "chunk 2");
        assert_eq!(UnitId::Page(7).to_string(), "page 7");
    }

    #[test]
    fn exam_report_rows_follow_unit_order() {
        let report = ExamReport {
            exam_id: "EX".into(),
            pages: 3,
            units: vec![
                unit(UnitId::Page(1), &["a,1,t,f,1,1990", "b,1,t,f,1,1990"], false),
                unit(UnitId::Page(2), &[], true),
                unit(UnitId::Page(3), &["c,1,t,f,3,1990"], false),
            ],
            read_errors: vec![],
            csv_path: None,
            csv_error: None,
        };
        let rows: Vec<&str> = report.rows().collect();
        assert_eq!(rows, vec!["a,1,t,f,1,1990", "b,1,t,f,1,1990", "c,1,t,f,3,1990"]);
        assert_eq!(report.row_count(), 3);
        assert_eq!(report.failed_units(), 1);
        assert!(!report.is_saved());
    }

    #[test]
    fn raw_output_is_not_serialised() {
        let mut u = unit(UnitId::Chunk(1), &[], false);
        u.raw = "SECRET RAW OUTPUT".into();
        let json = serde_json::to_string(&u).expect("serialise");
        assert!(!json.contains("SECRET RAW OUTPUT"));
    }

    #[test]
    fn extraction_summary_counts() {
        let summary = ExtractionSummary {
            pdfs: vec![
                PdfOutcome {
                    pdf: "a.pdf".into(),
                    pages: 2,
                    artifacts: vec!["a_page_1.txt".into(), "a_page_2.txt".into()],
                    error: None,
                },
                PdfOutcome {
                    pdf: "b.pdf".into(),
                    pages: 0,
                    artifacts: vec![],
                    error: Some(UnitError::NotAPdf {
                        path: "b.pdf".into(),
                        magic: b"oops".to_vec(),
                    }),
                },
            ],
        };
        assert_eq!(summary.processed(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.artifacts(), 2);
    }
}
