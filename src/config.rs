//! Configuration types for the exam-to-CSV pipeline.
//!
//! Every knob of a run lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The config is constructed once at process
//! start and passed by reference into each stage; nothing in the library
//! reads directory paths or API clients from global state.

use crate::error::ExamCsvError;
use crate::pipeline::llm::RowsModel;
use crate::pipeline::pdfium::PageSource;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use exam2csv::{Granularity, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .pdf_dir("scans")
///     .granularity(Granularity::Page)
///     .concurrency(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory holding the input PDFs. Default: `./pdfs`.
    pub pdf_dir: PathBuf,

    /// Directory for the per-page text artifacts. Default: `./txt_outputs`.
    pub text_dir: PathBuf,

    /// Directory for the CSV outputs. Default: `./csv_outputs`.
    pub csv_dir: PathBuf,

    /// How extracted text is laid out on disk. Default: [`ArtifactLayout::PerPage`].
    pub layout: ArtifactLayout,

    /// Run tesseract over embedded images. Default: true.
    pub ocr_enabled: bool,

    /// Tesseract executable name or path. Default: `tesseract`.
    pub ocr_binary: String,

    /// Tesseract language code(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub ocr_language: String,

    /// Pre-constructed PDF backend. Takes precedence over the pdfium default.
    pub page_source: Option<Arc<dyn PageSource>>,

    /// Whether prompts cover a chunk of pages or a single page. Default: [`Granularity::Chunk`].
    pub granularity: Granularity,

    /// Maximum pages per chunk in chunk mode. Default: 8.
    ///
    /// Eight pages of a typical exam paper stay comfortably inside a 16K
    /// context window together with the instructions and worked example.
    pub max_pages_per_chunk: usize,

    /// Concurrent model requests in page mode. Default: 3.
    pub concurrency: usize,

    /// LLM model identifier. If None, uses `gpt-4o-mini` for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed rows model. Takes precedence over every provider setting.
    pub rows_model: Option<Arc<dyn RowsModel>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per request. Default: 3000.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Row filtering strictness. Default: [`ValidationMode::Heuristic`].
    pub validation: ValidationMode,

    /// Optional progress events sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pdf_dir: PathBuf::from("./pdfs"),
            text_dir: PathBuf::from("./txt_outputs"),
            csv_dir: PathBuf::from("./csv_outputs"),
            layout: ArtifactLayout::default(),
            ocr_enabled: true,
            ocr_binary: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            page_source: None,
            granularity: Granularity::default(),
            max_pages_per_chunk: 8,
            concurrency: 3,
            model: None,
            provider_name: None,
            provider: None,
            rows_model: None,
            temperature: 0.1,
            max_tokens: 3000,
            system_prompt: None,
            validation: ValidationMode::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("pdf_dir", &self.pdf_dir)
            .field("text_dir", &self.text_dir)
            .field("csv_dir", &self.csv_dir)
            .field("layout", &self.layout)
            .field("ocr_enabled", &self.ocr_enabled)
            .field("ocr_language", &self.ocr_language)
            .field("page_source", &self.page_source.as_ref().map(|_| "<dyn PageSource>"))
            .field("granularity", &self.granularity)
            .field("max_pages_per_chunk", &self.max_pages_per_chunk)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("rows_model", &self.rows_model.as_ref().map(|_| "<dyn RowsModel>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("validation", &self.validation)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn pdf_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdf_dir = dir.into();
        self
    }

    pub fn text_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.text_dir = dir.into();
        self
    }

    pub fn csv_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.csv_dir = dir.into();
        self
    }

    pub fn layout(mut self, layout: ArtifactLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr_enabled = v;
        self
    }

    pub fn ocr_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.ocr_binary = binary.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn page_source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.config.page_source = Some(source);
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.config.granularity = granularity;
        self
    }

    pub fn max_pages_per_chunk(mut self, n: usize) -> Self {
        self.config.max_pages_per_chunk = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn rows_model(mut self, model: Arc<dyn RowsModel>) -> Self {
        self.config.rows_model = Some(model);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.config.validation = mode;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ExamCsvError> {
        let c = &self.config;
        if c.max_pages_per_chunk == 0 {
            return Err(ExamCsvError::InvalidConfig(
                "Chunk size must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ExamCsvError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExamCsvError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.ocr_enabled && c.ocr_language.trim().is_empty() {
            return Err(ExamCsvError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the extractor writes text artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArtifactLayout {
    /// One `{pdf}_page_{n}.txt` per page. (default)
    #[default]
    PerPage,
    /// One `{pdf}.txt` per document with `--- Page N ---` markers.
    Combined,
}

/// Scope of one language-model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Granularity {
    /// Up to `max_pages_per_chunk` pages per request, sent sequentially. (default)
    #[default]
    Chunk,
    /// One page per request, `concurrency` requests in flight.
    Page,
}

/// How strictly model output lines are checked before they reach a CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Comma-count and marker heuristics only. (default)
    #[default]
    Heuristic,
    /// Heuristics, then a real CSV parse requiring exactly six fields.
    Strict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.pdf_dir, PathBuf::from("./pdfs"));
        assert_eq!(c.text_dir, PathBuf::from("./txt_outputs"));
        assert_eq!(c.csv_dir, PathBuf::from("./csv_outputs"));
        assert_eq!(c.max_pages_per_chunk, 8);
        assert_eq!(c.concurrency, 3);
        assert_eq!(c.max_tokens, 3000);
        assert_eq!(c.granularity, Granularity::Chunk);
        assert_eq!(c.layout, ArtifactLayout::PerPage);
        assert_eq!(c.validation, ValidationMode::Heuristic);
        assert!((c.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn builder_clamps_zero_limits() {
        let c = PipelineConfig::builder()
            .max_pages_per_chunk(0)
            .concurrency(0)
            .build()
            .expect("clamped values are valid");
        assert_eq!(c.max_pages_per_chunk, 1);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_zero_max_tokens() {
        let err = PipelineConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, ExamCsvError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_blank_ocr_language() {
        assert!(PipelineConfig::builder().ocr_language(" ").build().is_err());
        assert!(PipelineConfig::builder()
            .ocr_enabled(false)
            .ocr_language("")
            .build()
            .is_ok());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", PipelineConfig::default());
        assert!(dbg.contains("PipelineConfig"));
        assert!(dbg.contains("max_pages_per_chunk"));
    }
}
