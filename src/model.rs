//! Language model access for the title, summary and correction stages.
//!
//! [`ModelService`] owns the model lifecycle (load, unload, is-ready) and is
//! handed to the orchestrator explicitly. A service with nothing loaded is a
//! normal state: [`ModelService::generate`] then answers `Ok(None)` and the
//! caller degrades the stage.
//!
//! Generation goes through the [`TextGenerator`] trait. The production
//! implementation, [`ProviderGenerator`], wraps an `edgequake_llm` provider;
//! tests plug in scripted generators.

use crate::config::IngestConfig;
use crate::error::{GenerationError, IngestError};
use crate::prompts::{
    correct_prompt, summarize_prompt, title_prompt, CORRECT_SYSTEM_PROMPT, DEFAULT_STOP,
    SUMMARIZE_SYSTEM_PROMPT, TITLE_STOP, TITLE_SYSTEM_PROMPT, TRUNCATION_MARKER,
};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Which stage a generation serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmTask {
    Title,
    Summarize,
    Correct,
}

/// One generation call: prompts plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub task: LlmTask,
    pub system: String,
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Output is cut at the first occurrence of any of these.
    pub stop: Vec<String>,
}

impl GenerationRequest {
    /// Title request over the first `title_context_chars` characters.
    pub fn title(document: &str, config: &IngestConfig) -> Self {
        let head: String = document.chars().take(config.title_context_chars).collect();
        Self {
            task: LlmTask::Title,
            system: TITLE_SYSTEM_PROMPT.to_string(),
            prompt: title_prompt(&head),
            max_tokens: config.title_max_tokens,
            temperature: config.title_temperature,
            stop: TITLE_STOP.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Summarise-and-correct request.
    pub fn summarize(document: &str, config: &IngestConfig) -> Self {
        let body = truncate_for_prompt(document, config.max_llm_input_chars);
        Self {
            task: LlmTask::Summarize,
            system: SUMMARIZE_SYSTEM_PROMPT.to_string(),
            prompt: summarize_prompt(&body),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
            stop: DEFAULT_STOP.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Correct-only request.
    pub fn correct(document: &str, config: &IngestConfig) -> Self {
        let body = truncate_for_prompt(document, config.max_llm_input_chars);
        Self {
            task: LlmTask::Correct,
            system: CORRECT_SYSTEM_PROMPT.to_string(),
            prompt: correct_prompt(&body),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
            stop: DEFAULT_STOP.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Cut `text` to `max_chars` characters, appending the truncation marker.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            warn!(
                "Document too long ({} chars), truncating to {}",
                text.chars().count(),
                max_chars
            );
            format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER)
        }
        None => text.to_string(),
    }
}

/// Cut `text` at the earliest stop sequence.
pub fn apply_stop<'a>(text: &'a str, stop: &[String]) -> &'a str {
    let end = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
        .unwrap_or(text.len());
    &text[..end]
}

/// Strip whitespace and surrounding quotes from a generated title.
pub fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
        .trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Something that turns a [`GenerationRequest`] into text.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>>;
}

/// [`TextGenerator`] backed by an `edgequake_llm` chat provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

impl TextGenerator for ProviderGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(request.system.as_str()),
                ChatMessage::user(request.prompt.as_str()),
            ];
            let options = CompletionOptions {
                temperature: Some(request.temperature),
                max_tokens: Some(request.max_tokens),
                ..Default::default()
            };
            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| GenerationError::Provider(e.to_string()))?;
            debug!(
                "{:?}: {} input tokens, {} output tokens",
                request.task, response.prompt_tokens, response.completion_tokens
            );
            Ok(response.content)
        })
    }
}

/// Load state reported by [`ModelService::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub loaded: bool,
    /// `provider/model` of the loaded model.
    pub descriptor: Option<String>,
}

struct LoadedModel {
    generator: Arc<dyn TextGenerator>,
    descriptor: String,
}

/// Owner of the (at most one) loaded language model.
#[derive(Default)]
pub struct ModelService {
    loaded: RwLock<Option<LoadedModel>>,
}

impl std::fmt::Debug for ModelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelService")
            .field("info", &self.info())
            .finish()
    }
}

impl ModelService {
    /// A service with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// A service with `generator` already loaded.
    pub fn with_generator(generator: Arc<dyn TextGenerator>, descriptor: impl Into<String>) -> Self {
        let service = Self::new();
        service.load_generator(generator, descriptor);
        service
    }

    /// Resolve the configured provider and load it.
    pub fn load(&self, config: &IngestConfig) -> Result<ModelInfo, IngestError> {
        let provider = resolve_provider(config)?;
        let descriptor = format!(
            "{}/{}",
            config.provider_name.as_deref().unwrap_or("auto"),
            config.model.as_deref().unwrap_or("default")
        );
        self.load_generator(Arc::new(ProviderGenerator::new(provider)), descriptor);
        Ok(self.info())
    }

    /// Install `generator`, replacing whatever was loaded.
    pub fn load_generator(&self, generator: Arc<dyn TextGenerator>, descriptor: impl Into<String>) {
        let descriptor = descriptor.into();
        info!("Language model loaded: {}", descriptor);
        *self.write() = Some(LoadedModel {
            generator,
            descriptor,
        });
    }

    /// Drop the loaded model. Returns whether one was loaded.
    pub fn unload(&self) -> bool {
        let was_loaded = self.write().take().is_some();
        if was_loaded {
            info!("Language model unloaded");
        }
        was_loaded
    }

    pub fn is_ready(&self) -> bool {
        self.read().is_some()
    }

    pub fn info(&self) -> ModelInfo {
        let guard = self.read();
        ModelInfo {
            loaded: guard.is_some(),
            descriptor: guard.as_ref().map(|m| m.descriptor.clone()),
        }
    }

    /// Run `request` on the loaded model.
    ///
    /// `Ok(None)` when nothing is loaded or the model produced only
    /// whitespace. Stop sequences are applied to the output.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        let generator = match self.read().as_ref() {
            Some(m) => Arc::clone(&m.generator),
            None => {
                debug!("{:?}: no language model loaded", request.task);
                return Ok(None);
            }
        };

        let raw = generator.generate(request).await?;
        let text = apply_stop(&raw, &request.stop).trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<LoadedModel>> {
        self.loaded.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<LoadedModel>> {
        self.loaded.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, IngestError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IngestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model` (default [`DEFAULT_MODEL`])
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. whatever [`ProviderFactory::from_env`] detects
///
/// The same chain serves the text stages and vision OCR.
pub fn resolve_provider(config: &IngestConfig) -> Result<Arc<dyn LLMProvider>, IngestError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IngestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
