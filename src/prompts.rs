//! Prompts for turning exam-paper text into CSV rows.
//!
//! Every prompt lives here so the rules and the worked example can be
//! inspected by unit tests and changed in one place. Callers can override
//! the system prompt via [`crate::config::PipelineConfig::system_prompt`];
//! the user prompts are always built by [`chunk_prompt`] / [`page_prompt`].

/// CSV header written at the top of every output file.
pub const CSV_HEADER: &str = "question,marks,paper_title,filename,page,year";

/// Default system message for every extraction request.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a precise CSV data extractor. Output only valid CSV rows.";

/// Section label that closes each user prompt; models sometimes echo it.
pub const OUTPUT_LABEL: &str = "### CSV OUTPUT ###";

/// Marker placed before each page's text in chunk mode.
pub fn page_marker(page_num: usize) -> String {
    format!("--- Page {page_num} ---")
}

/// Build the user prompt for a multi-page chunk.
///
/// `combined_text` must already carry one [`page_marker`] per page; the model
/// reads page numbers from those markers.
pub fn chunk_prompt(exam_id: &str, chunk_num: usize, combined_text: &str) -> String {
    format!(
        r#"You are a CSV data extractor for medical exam papers.
Convert the following MULTI-PAGE exam text into CSV format.

### OUTPUT FORMAT ###
Each row must follow this exact structure:
{CSV_HEADER}

### RULES ###
1. Use the exam heading (from the first page) as paper_title for ALL rows.
2. Extract EVERY question from ALL pages (including subparts a, b, c).
3. Clean questions: remove numbering, keep only the actual question text.
4. Set marks = 5 for each question unless stated otherwise.
5. Use filename: {exam_id}.pdf
6. Use the correct page number (from the markers like --- Page 2 ---).
7. Extract year from the exam date in the heading (e.g., "March 1990" → 1990).
8. Put quotes around fields that contain commas.
9. Output ONLY CSV rows (no headers, no notes).

{example}

### TEXT TO CONVERT (chunk {chunk_num}) ###
{combined_text}

{OUTPUT_LABEL}
"#,
        example = worked_example(exam_id),
    )
}

/// Build the user prompt for a single page.
///
/// The page number is stated outright so the model does not have to infer it.
pub fn page_prompt(exam_id: &str, page_num: usize, page_text: &str) -> String {
    format!(
        r#"You are a CSV data extractor for medical exam papers.
Convert the following exam page into CSV format.

### OUTPUT FORMAT ###
Each row must follow this exact structure:
{CSV_HEADER}

### RULES ###
1. Use the exam heading as paper_title for ALL rows. If this page has no heading, reuse the heading style shown in the example.
2. Extract EVERY question on the page (including subparts a, b, c).
3. Clean questions: remove numbering, keep only the actual question text.
4. Set marks = 5 for each question unless stated otherwise.
5. Use filename: {exam_id}.pdf
6. Use page number: {page_num}
7. Extract year from the exam date in the heading (e.g., "March 1990" → 1990). Leave it blank if no date is visible.
8. Put quotes around fields that contain commas.
9. Output ONLY CSV rows (no headers, no notes).

{example}

### TEXT TO CONVERT (page {page_num}) ###
{page_text}

{OUTPUT_LABEL}
"#,
        example = worked_example(exam_id),
    )
}

/// Few-shot example shared by both prompt shapes.
fn worked_example(exam_id: &str) -> String {
    let title = "M.S. DEGREE EXAMINATION, March 1990 – General Surgery – Applied Basic Sciences";
    format!(
        r#"### SAMPLE INPUT ###
--- Page 1 ---
M.S. DEGREE EXAMINATION, March 1990
General Surgery – Applied Basic Sciences
1. Describe the surgical anatomy of the thyroid gland.
2. Write notes on: (a) Deep palmar spaces. (b) Femoral canal.

--- Page 2 ---
PHYSIOLOGY
(a) Pain pathway
(b) Cardiac cycle

### SAMPLE OUTPUT ###
"Describe the surgical anatomy of the thyroid gland",5,"{title}","{exam_id}.pdf",1,1990
"Write notes on: Deep palmar spaces",5,"{title}","{exam_id}.pdf",1,1990
"Write notes on: Femoral canal",5,"{title}","{exam_id}.pdf",1,1990
"Pain pathway",5,"{title}","{exam_id}.pdf",2,1990
"Cardiac cycle",5,"{title}","{exam_id}.pdf",2,1990"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_prompt_embeds_filename_and_chunk() {
        let p = chunk_prompt("MS_1990", 2, "--- Page 9 ---\nAnatomy\n\n");
        assert!(p.contains("Use filename: MS_1990.pdf"));
        assert!(p.contains("### TEXT TO CONVERT (chunk 2) ###"));
        assert!(p.contains("--- Page 9 ---\nAnatomy"));
        assert!(p.trim_end().ends_with(OUTPUT_LABEL));
    }

    #[test]
    fn page_prompt_states_page_number() {
        let p = page_prompt("EX1", 4, "Cardiac cycle");
        assert!(p.contains("Use page number: 4"));
        assert!(p.contains("### TEXT TO CONVERT (page 4) ###"));
        assert!(p.contains("\"EX1.pdf\",2,1990"));
    }

    #[test]
    fn worked_example_rows_have_six_fields() {
        let example = worked_example("EX1");
        let rows: Vec<&str> = example
            .lines()
            .skip_while(|l| !l.starts_with("### SAMPLE OUTPUT"))
            .skip(1)
            .collect();
        assert_eq!(rows.len(), 5);
        for row in rows {
            let fields = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_reader(row.as_bytes())
                .records()
                .next()
                .expect("one record")
                .expect("valid csv");
            assert_eq!(fields.len(), 6, "row: {row}");
        }
    }

    #[test]
    fn header_has_six_columns() {
        assert_eq!(CSV_HEADER.split(',').count(), 6);
    }
}
