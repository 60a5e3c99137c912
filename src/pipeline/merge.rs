//! Writing per-exam and combined CSV files.
//!
//! Rows are written verbatim under a single [`CSV_HEADER`] line. Files are
//! written to a temp file in the target directory and renamed into place,
//! so a reader never sees a half-written CSV.

use crate::error::ExamCsvError;
use crate::prompts::CSV_HEADER;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the union of all exams' rows.
pub const COMBINED_FILE_NAME: &str = "all_exams_combined.csv";

/// Header line followed by one line per row, newline-terminated.
pub fn render_csv<I, S>(rows: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(row.as_ref());
        out.push('\n');
    }
    out
}

/// Write `{csv_dir}/{exam_id}.csv`.
pub fn write_exam_csv<S: AsRef<str>>(
    csv_dir: &Path,
    exam_id: &str,
    rows: &[S],
) -> Result<PathBuf, ExamCsvError> {
    let path = csv_dir.join(format!("{exam_id}.csv"));
    write_atomic(&path, &render_csv(rows))?;
    info!("Saved {} rows to {}", rows.len(), path.display());
    Ok(path)
}

/// Write [`COMBINED_FILE_NAME`] with every exam's rows, exams in the given order.
///
/// Returns the path and the number of data rows written.
pub fn write_combined_csv<'a, I>(csv_dir: &Path, exams: I) -> Result<(PathBuf, usize), ExamCsvError>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let rows: Vec<&String> = exams.into_iter().flatten().collect();
    let path = csv_dir.join(COMBINED_FILE_NAME);
    write_atomic(&path, &render_csv(&rows))?;
    info!("Combined CSV: {} rows in {}", rows.len(), path.display());
    Ok((path, rows.len()))
}

fn write_atomic(path: &Path, body: &str) -> Result<(), ExamCsvError> {
    let write_err = |e: std::io::Error| ExamCsvError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(body.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
