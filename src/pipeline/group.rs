//! Grouping text artifacts into exams.
//!
//! The exam identifier is everything before the first `_page_` in the file
//! name; the page number is whatever follows it up to the first `.`. Names
//! without the convention become single-page exams keyed by their base
//! name. An unparsable page number falls back to 1 rather than failing.

use crate::error::ExamCsvError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static RE_PAGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<id>.*?)_page_(?P<page>[^.]*)").unwrap());

/// One text artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifact {
    pub exam_id: String,
    pub page_num: usize,
    pub file_name: String,
    pub path: PathBuf,
}

impl PageArtifact {
    pub async fn read_text(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(&self.path).await
    }
}

/// The artifacts of one exam, ordered by ascending page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamGroup {
    pub exam_id: String,
    pub pages: Vec<PageArtifact>,
}

/// Split an artifact file name into `(exam_id, page_num)`.
///
/// Page numbers are unsigned; anything that is not a non-negative integer,
/// including `-3`, counts as page 1.
pub fn parse_artifact_name(file_name: &str) -> (String, usize) {
    match RE_PAGE_SUFFIX.captures(file_name) {
        Some(caps) => {
            let page = caps["page"].parse::<usize>().unwrap_or(1);
            (caps["id"].to_string(), page)
        }
        None => {
            let base = file_name.strip_suffix(".txt").unwrap_or(file_name);
            (base.to_string(), 1)
        }
    }
}

/// Group artifact file names under `dir`.
///
/// Groups keep the order in which their first member appears in `names`;
/// pages within a group are stably sorted by page number.
pub fn group_artifacts<I, S>(dir: &Path, names: I) -> Vec<ExamGroup>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups: Vec<ExamGroup> = Vec::new();

    for name in names {
        let file_name = name.as_ref();
        let (exam_id, page_num) = parse_artifact_name(file_name);
        let artifact = PageArtifact {
            exam_id: exam_id.clone(),
            page_num,
            file_name: file_name.to_string(),
            path: dir.join(file_name),
        };

        match groups.iter_mut().find(|g| g.exam_id == exam_id) {
            Some(group) => group.pages.push(artifact),
            None => groups.push(ExamGroup {
                exam_id,
                pages: vec![artifact],
            }),
        }
    }

    for group in &mut groups {
        group.pages.sort_by_key(|p| p.page_num);
    }

    groups
}

/// Scan `text_dir` for `*.txt` artifacts and group them into exams.
///
/// A missing directory is not an error: it yields no groups, the same as an
/// empty one.
pub async fn discover_groups(text_dir: &Path) -> Result<Vec<ExamGroup>, ExamCsvError> {
    if !text_dir.exists() {
        warn!("Folder {} does not exist", text_dir.display());
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(text_dir)
        .await
        .map_err(|e| ExamCsvError::DirectoryUnreadable {
            path: text_dir.to_path_buf(),
            source: e,
        })?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExamCsvError::DirectoryUnreadable {
            path: text_dir.to_path_buf(),
            source: e,
        })?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".txt") {
            names.push(name);
        }
    }
    names.sort();

    let groups = group_artifacts(text_dir, &names);
    debug!(
        "Found {} artifacts in {} exam groups under {}",
        names.len(),
        groups.len(),
        text_dir.display()
    );
    Ok(groups)
}
