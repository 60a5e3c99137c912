//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as PDFs are extracted and exams are converted. The trait is
//! `Send + Sync` because page-mode requests run concurrently.
//!
//! # Example
//!
//! ```rust
//! use exam2csv::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for RowCounter {
//!     fn on_exam_complete(&self, exam_id: &str, rows: usize) {
//!         let total = self.rows.fetch_add(rows, Ordering::SeqCst) + rows;
//!         eprintln!("{exam_id}: {rows} rows ({total} so far)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(RowCounter { rows: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it moves through PDFs, exams and model requests.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. In page mode `on_unit_start`, `on_unit_complete` and
/// `on_unit_error` may be called concurrently.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before stage 1 with the number of PDFs found.
    fn on_extraction_start(&self, total_pdfs: usize) {
        let _ = total_pdfs;
    }

    /// Called when a PDF has been written out as text artifacts.
    fn on_pdf_complete(&self, pdf_name: &str, pages: usize) {
        let _ = (pdf_name, pages);
    }

    /// Called when a PDF is skipped.
    fn on_pdf_skipped(&self, pdf_name: &str, error: &str) {
        let _ = (pdf_name, error);
    }

    /// Called before an exam's model requests are issued.
    ///
    /// # Arguments
    /// * `exam_id` — exam identifier derived from artifact names
    /// * `units`   — number of chunk/page requests that will be made
    fn on_exam_start(&self, exam_id: &str, units: usize) {
        let _ = (exam_id, units);
    }

    /// Called just before a request is sent. `unit` is e.g. `"chunk 2"` or `"page 5"`.
    fn on_unit_start(&self, exam_id: &str, unit: &str) {
        let _ = (exam_id, unit);
    }

    /// Called when a request returns; `rows` counts the lines that survived validation.
    fn on_unit_complete(&self, exam_id: &str, unit: &str, rows: usize) {
        let _ = (exam_id, unit, rows);
    }

    /// Called when a request fails. The unit contributes no rows.
    fn on_unit_error(&self, exam_id: &str, unit: &str, error: &str) {
        let _ = (exam_id, unit, error);
    }

    /// Called once all of an exam's requests have been attempted.
    fn on_exam_complete(&self, exam_id: &str, rows: usize) {
        let _ = (exam_id, rows);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        skipped: AtomicUsize,
        unit_ok: AtomicUsize,
        unit_err: AtomicUsize,
        rows: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_pdf_skipped(&self, _pdf_name: &str, _error: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_complete(&self, _exam_id: &str, _unit: &str, _rows: usize) {
            self.unit_ok.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _exam_id: &str, _unit: &str, _error: &str) {
            self.unit_err.fetch_add(1, Ordering::SeqCst);
        }

        fn on_exam_complete(&self, _exam_id: &str, rows: usize) {
            self.rows.fetch_add(rows, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(2);
        cb.on_pdf_complete("a.pdf", 3);
        cb.on_pdf_skipped("b.pdf", "corrupt");
        cb.on_exam_start("a", 1);
        cb.on_unit_start("a", "chunk 1");
        cb.on_unit_complete("a", "chunk 1", 4);
        cb.on_unit_error("a", "chunk 2", "timeout");
        cb.on_exam_complete("a", 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_pdf_skipped("broken.pdf", "not a PDF");
        tracker.on_unit_complete("EX1", "page 1", 2);
        tracker.on_unit_complete("EX1", "page 2", 1);
        tracker.on_unit_error("EX1", "page 3", "500");
        tracker.on_exam_complete("EX1", 3);

        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.unit_ok.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.unit_err.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.rows.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_exam_start("EX1", 2);
        cb.on_exam_complete("EX1", 0);
    }
}
