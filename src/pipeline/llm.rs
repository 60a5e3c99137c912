//! Rows extraction: one language-model request per chunk or page.
//!
//! Prompts live in [`crate::prompts`] and filtering in
//! [`crate::pipeline::validate`]; this module only builds requests, sends
//! them and records what came back.
//!
//! ## Failure policy
//!
//! A failed request is logged, recorded on its [`UnitResult`] and treated as
//! empty output. It never aborts the exam or the batch, and it is not
//! retried.
//!
//! ## Ordering
//!
//! Chunks are sent one after another. Pages are sent concurrently through
//! `buffer_unordered(config.concurrency)` and sorted back into page order
//! once all have returned, so output never depends on completion order.

use crate::config::{Granularity, PipelineConfig};
use crate::error::{ExamCsvError, UnitError};
use crate::output::{UnitId, UnitResult};
use crate::pipeline::chunk::chunk_pages;
use crate::pipeline::validate::validate_rows;
use crate::prompts::{chunk_prompt, page_marker, page_prompt, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// One page's text as handed to the rows extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInput {
    pub page_num: usize,
    pub text: String,
}

impl PageInput {
    pub fn new(page_num: usize, text: impl Into<String>) -> Self {
        Self {
            page_num,
            text: text.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A fully built extraction request.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsRequest {
    pub exam_id: String,
    pub unit: UnitId,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Raw model output plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowsResponse {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anything that can answer a [`RowsRequest`].
///
/// [`ProviderModel`] is the production implementation; tests plug in a
/// canned model through [`crate::config::PipelineConfigBuilder::rows_model`].
#[async_trait]
pub trait RowsModel: Send + Sync {
    async fn complete(&self, request: &RowsRequest) -> Result<RowsResponse, ExamCsvError>;
}

/// [`RowsModel`] backed by an edgequake-llm chat provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RowsModel for ProviderModel {
    async fn complete(&self, request: &RowsRequest) -> Result<RowsResponse, ExamCsvError> {
        let messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.prompt.as_str()),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ExamCsvError::LlmApiError {
                message: e.to_string(),
            })?;

        Ok(RowsResponse {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

fn build_options(request: &RowsRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

/// Resolve the rows model, from most-specific to least-specific:
///
/// 1. `config.rows_model`, used as-is
/// 2. `config.provider`, wrapped in a [`ProviderModel`]
/// 3. `config.provider_name` with `config.model` (default [`DEFAULT_MODEL`])
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 5. OpenAI when `OPENAI_API_KEY` is set
/// 6. whatever [`ProviderFactory::from_env`] detects
///
/// API keys are only ever read from the environment.
pub fn resolve_model(config: &PipelineConfig) -> Result<Arc<dyn RowsModel>, ExamCsvError> {
    if let Some(ref model) = config.rows_model {
        return Ok(Arc::clone(model));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderModel::new(provider)))
}

fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ExamCsvError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExamCsvError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY (or another provider key), or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(provider)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExamCsvError> {
    info!("Using LLM provider {} with model {}", name, model);
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ExamCsvError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Extract rows for one exam, dispatching on [`PipelineConfig::granularity`].
///
/// Units come back in chunk or page order. Blank pages are never sent, so a
/// unit made only of blank pages is absent from the result.
pub async fn extract_rows(
    model: &Arc<dyn RowsModel>,
    exam_id: &str,
    pages: &[PageInput],
    config: &PipelineConfig,
) -> Vec<UnitResult> {
    match config.granularity {
        Granularity::Chunk => {
            let mut results = Vec::new();
            for (idx, chunk) in chunk_pages(pages, config.max_pages_per_chunk)
                .into_iter()
                .enumerate()
            {
                if let Some(result) = process_chunk(model, exam_id, idx + 1, chunk, config).await {
                    results.push(result);
                }
            }
            results
        }
        Granularity::Page => {
            let mut tagged: Vec<(usize, UnitResult)> =
                stream::iter(pages.iter().enumerate().map(|(idx, page)| async move {
                    process_page(model, exam_id, page, config)
                        .await
                        .map(|result| (idx, result))
                }))
                .buffer_unordered(config.concurrency.max(1))
                .filter_map(|tagged| async move { tagged })
                .collect()
                .await;

            tagged.sort_by_key(|(idx, _)| *idx);
            tagged.into_iter().map(|(_, result)| result).collect()
        }
    }
}

/// Send one chunk of pages. Returns `None` when every page in it is blank.
pub async fn process_chunk(
    model: &Arc<dyn RowsModel>,
    exam_id: &str,
    chunk_num: usize,
    pages: &[PageInput],
    config: &PipelineConfig,
) -> Option<UnitResult> {
    let filled: Vec<&PageInput> = pages.iter().filter(|p| !p.is_blank()).collect();
    if filled.is_empty() {
        debug!("{} chunk {}: all pages blank, not sent", exam_id, chunk_num);
        return None;
    }

    let combined: String = filled
        .iter()
        .map(|p| format!("{}\n{}\n\n", page_marker(p.page_num), p.text))
        .collect();
    let page_nums = filled.iter().map(|p| p.page_num).collect();
    let prompt = chunk_prompt(exam_id, chunk_num, &combined);

    Some(run_unit(model, exam_id, UnitId::Chunk(chunk_num), page_nums, prompt, config).await)
}

/// Send one page. Returns `None` when the page is blank.
pub async fn process_page(
    model: &Arc<dyn RowsModel>,
    exam_id: &str,
    page: &PageInput,
    config: &PipelineConfig,
) -> Option<UnitResult> {
    if page.is_blank() {
        debug!("{} page {}: blank, not sent", exam_id, page.page_num);
        return None;
    }

    let prompt = page_prompt(exam_id, page.page_num, &page.text);
    Some(
        run_unit(
            model,
            exam_id,
            UnitId::Page(page.page_num),
            vec![page.page_num],
            prompt,
            config,
        )
        .await,
    )
}

async fn run_unit(
    model: &Arc<dyn RowsModel>,
    exam_id: &str,
    unit: UnitId,
    pages: Vec<usize>,
    prompt: String,
    config: &PipelineConfig,
) -> UnitResult {
    let unit_label = unit.to_string();
    if let Some(ref cb) = config.progress_callback {
        cb.on_unit_start(exam_id, &unit_label);
    }

    let request = RowsRequest {
        exam_id: exam_id.to_string(),
        unit,
        system: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        prompt,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let start = Instant::now();
    let outcome = model.complete(&request).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(response) => {
            let rows = validate_rows(&response.content, config.validation);
            debug!(
                "{} {}: {} rows, {} input tokens, {} output tokens, {}ms",
                exam_id,
                unit_label,
                rows.len(),
                response.input_tokens,
                response.output_tokens,
                duration_ms
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_complete(exam_id, &unit_label, rows.len());
            }
            UnitResult {
                unit,
                pages,
                raw: response.content,
                rows,
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                duration_ms,
                error: None,
            }
        }
        Err(e) => {
            let error = UnitError::LlmFailed {
                exam_id: exam_id.to_string(),
                unit: unit_label.clone(),
                detail: e.to_string(),
            };
            warn!("{}", error);
            if let Some(ref cb) = config.progress_callback {
                cb.on_unit_error(exam_id, &unit_label, &error.to_string());
            }
            UnitResult {
                unit,
                pages,
                raw: String::new(),
                rows: Vec::new(),
                input_tokens: 0,
                output_tokens: 0,
                duration_ms,
                error: Some(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::OUTPUT_LABEL;
    use std::sync::Mutex;

    /// The part of a prompt after the worked example.
    fn text_section(prompt: &str) -> &str {
        let start = prompt.find("### TEXT TO CONVERT").expect("text section");
        &prompt[start..]
    }

    /// Records every request and answers with one row per page it sees.
    #[derive(Default)]
    struct EchoModel {
        requests: Mutex<Vec<RowsRequest>>,
    }

    #[async_trait]
    impl RowsModel for EchoModel {
        async fn complete(&self, request: &RowsRequest) -> Result<RowsResponse, ExamCsvError> {
            self.requests.lock().unwrap().push(request.clone());
            let pages: Vec<usize> = match request.unit {
                UnitId::Page(n) => vec![n],
                UnitId::Chunk(_) => (1..=50)
                    .filter(|n| text_section(&request.prompt).contains(&page_marker(*n)))
                    .collect(),
            };
            let content = pages
                .iter()
                .map(|n| format!("\"Q{n}\",5,\"T\",\"{}.pdf\",{n},1990", request.exam_id))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(RowsResponse {
                content: format!("```csv\n{content}\n```"),
                input_tokens: 10,
                output_tokens: 5,
            })
        }
    }

    struct FailingModel;

    #[async_trait]
    impl RowsModel for FailingModel {
        async fn complete(&self, _request: &RowsRequest) -> Result<RowsResponse, ExamCsvError> {
            Err(ExamCsvError::LlmApiError {
                message: "rate limited".into(),
            })
        }
    }

    fn pages(texts: &[&str]) -> Vec<PageInput> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| PageInput::new(i + 1, *t))
            .collect()
    }

    #[test]
    fn build_options_carries_request_settings() {
        let config = PipelineConfig::default();
        let request = RowsRequest {
            exam_id: "EX1".into(),
            unit: UnitId::Page(1),
            system: DEFAULT_SYSTEM_PROMPT.into(),
            prompt: String::new(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        let opts = build_options(&request);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(3000));
    }

    #[test]
    fn explicit_rows_model_wins() {
        let model: Arc<dyn RowsModel> = Arc::new(FailingModel);
        let config = PipelineConfig::builder()
            .rows_model(Arc::clone(&model))
            .build()
            .unwrap();
        let resolved = resolve_model(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &model));
    }

    #[tokio::test]
    async fn chunk_skips_blank_pages_and_marks_the_rest() {
        let model = Arc::new(EchoModel::default());
        let dyn_model: Arc<dyn RowsModel> = model.clone();
        let config = PipelineConfig::default();

        let result = process_chunk(&dyn_model, "EX1", 1, &pages(&["heading", "  ", "q3"]), &config)
            .await
            .unwrap();

        assert_eq!(result.unit, UnitId::Chunk(1));
        assert_eq!(result.pages, vec![1, 3]);
        assert_eq!(result.rows.len(), 2);

        let requests = model.requests.lock().unwrap();
        let prompt = &requests[0].prompt;
        let text = text_section(prompt);
        assert!(text.contains("--- Page 1 ---\nheading\n\n--- Page 3 ---\nq3\n\n"));
        assert!(!text.contains("--- Page 2 ---"));
        assert!(prompt.contains("Use filename: EX1.pdf"));
        assert!(prompt.trim_end().ends_with(OUTPUT_LABEL));
        assert_eq!(requests[0].system, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn all_blank_chunk_is_not_sent() {
        let model = Arc::new(EchoModel::default());
        let dyn_model: Arc<dyn RowsModel> = model.clone();
        let config = PipelineConfig::default();

        let result = process_chunk(&dyn_model, "EX1", 2, &pages(&["", "\n\t"]), &config).await;
        assert!(result.is_none());
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn page_prompt_names_the_page() {
        let model = Arc::new(EchoModel::default());
        let dyn_model: Arc<dyn RowsModel> = model.clone();
        let config = PipelineConfig::builder()
            .system_prompt("custom system")
            .build()
            .unwrap();

        let result = process_page(&dyn_model, "EX9", &PageInput::new(7, "text"), &config)
            .await
            .unwrap();
        assert_eq!(result.unit, UnitId::Page(7));
        assert_eq!(result.rows, vec!["\"Q7\",5,\"T\",\"EX9.pdf\",7,1990"]);

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].prompt.contains("Use page number: 7"));
        assert_eq!(requests[0].system, "custom system");
    }

    #[tokio::test]
    async fn failure_is_recorded_not_raised() {
        let model: Arc<dyn RowsModel> = Arc::new(FailingModel);
        let config = PipelineConfig::default();

        let result = process_page(&model, "EX1", &PageInput::new(3, "text"), &config)
            .await
            .unwrap();
        assert!(result.rows.is_empty());
        let err = result.error.expect("error recorded");
        assert_eq!(err.to_string(), "EX1 page 3: LLM call failed: LLM API error: rate limited");
    }

    #[tokio::test]
    async fn chunk_mode_splits_by_max_pages() {
        let model = Arc::new(EchoModel::default());
        let dyn_model: Arc<dyn RowsModel> = model.clone();
        let config = PipelineConfig::builder()
            .max_pages_per_chunk(2)
            .build()
            .unwrap();

        let units = extract_rows(&dyn_model, "EX1", &pages(&["a", "b", "c", "", ""]), &config).await;
        let ids: Vec<UnitId> = units.iter().map(|u| u.unit).collect();
        assert_eq!(ids, vec![UnitId::Chunk(1), UnitId::Chunk(2)]);
        assert_eq!(units[1].pages, vec![3]);
        assert_eq!(model.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn page_mode_returns_page_order() {
        let model: Arc<dyn RowsModel> = Arc::new(EchoModel::default());
        let config = PipelineConfig::builder()
            .granularity(Granularity::Page)
            .concurrency(4)
            .build()
            .unwrap();

        let units = extract_rows(&model, "EX1", &pages(&["a", "", "c", "d"]), &config).await;
        let ids: Vec<UnitId> = units.iter().map(|u| u.unit).collect();
        assert_eq!(ids, vec![UnitId::Page(1), UnitId::Page(3), UnitId::Page(4)]);
    }
}
