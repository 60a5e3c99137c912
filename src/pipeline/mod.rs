//! Pipeline stages for exam-PDF-to-CSV conversion.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the PDF or model backend can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! pdfium+ocr ──▶ extract ──▶ group ──▶ chunk ──▶ llm ──▶ validate ──▶ merge
//!  (page text)   (.txt)     (exams)   (≤ 8 pp)  (rows)  (filter)     (.csv)
//! ```
//!
//! 1. [`pdfium`]   — read each page's text layer and embedded images
//! 2. [`ocr`]      — recover text from embedded images with tesseract
//! 3. [`extract`]  — write one text artifact per page (stage 1 output)
//! 4. [`group`]    — group artifacts into exams ordered by page number
//! 5. [`chunk`]    — bound the pages sent per request
//! 6. [`llm`]      — drive the model calls; the only stage with network I/O
//! 7. [`validate`] — drop lines that cannot be CSV rows
//! 8. [`merge`]    — write per-exam and combined CSVs

pub mod chunk;
pub mod extract;
pub mod group;
pub mod llm;
pub mod merge;
pub mod ocr;
pub mod pdfium;
pub mod validate;
