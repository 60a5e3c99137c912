//! Validation: keep only lines of model output that can be CSV rows.
//!
//! Models asked for "CSV rows only" still add code fences, echo the header
//! or the prompt's output label, and write the odd explanatory sentence.
//! These rules drop that noise without rewriting anything that survives:
//!
//! 1. blank after trimming
//! 2. starts with `#` (comments, echoed `###` section labels)
//! 3. contains a non-data marker (`###`, `CSV OUTPUT`, a code fence, or the header itself)
//! 4. fewer than 5 commas, i.e. fewer than 6 fields
//!
//! In [`ValidationMode::Strict`] a surviving line must also parse as a CSV
//! record with exactly 6 fields.

use crate::config::ValidationMode;
use crate::prompts::CSV_HEADER;
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum commas in a six-field row.
pub const MIN_COMMAS: usize = 5;

/// Fields in a row.
pub const FIELD_COUNT: usize = 6;

static RE_NON_DATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)###|csv output|```").unwrap());

/// Split raw model output into the lines that pass validation.
pub fn validate_rows(raw: &str, mode: ValidationMode) -> Vec<String> {
    raw.lines()
        .filter(|line| is_data_row(line))
        .filter(|line| match mode {
            ValidationMode::Heuristic => true,
            ValidationMode::Strict => has_six_fields(line),
        })
        .map(str::to_string)
        .collect()
}

/// Heuristic check for one line.
pub fn is_data_row(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    if RE_NON_DATA.is_match(trimmed) || is_header_echo(trimmed) {
        return false;
    }
    trimmed.matches(',').count() >= MIN_COMMAS
}

fn is_header_echo(trimmed: &str) -> bool {
    let normalised: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"')
        .collect();
    normalised.eq_ignore_ascii_case(CSV_HEADER)
}

/// Parse `line` as one CSV record and require exactly [`FIELD_COUNT`] fields.
fn has_six_fields(line: &str) -> bool {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.len() == FIELD_COUNT,
        _ => false,
    }
}
