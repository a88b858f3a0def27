//! Configuration types for document ingestion.
//!
//! All pipeline behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. One struct holds every knob so a config can
//! be shared across tasks, logged, and compared between two runs.
//!
//! # Design choice: builder over constructor
//! A twenty-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on the
//! documented defaults for the rest.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one ingestion pipeline.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ingest::{Feature, IngestConfig};
///
/// let config = IngestConfig::builder()
///     .extraction_timeout_secs(120)
///     .max_ocr_pages(20)
///     .features([Feature::Title, Feature::Category])
///     .build()
///     .unwrap();
/// assert!(!config.features.is_enabled(Feature::Summary));
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    // ── Extraction ───────────────────────────────────────────────────────
    /// Wall-clock budget for the whole extraction step, in seconds. Default: 300.
    ///
    /// OCR of a long scan is the slow path. When the budget runs out the
    /// request fails with [`IngestError::ExtractionTimeout`] and the
    /// extraction task is abandoned.
    pub extraction_timeout_secs: u64,

    /// Maximum number of pages sent through OCR. Default: 50.
    ///
    /// When a scan has more pages, only the first `max_ocr_pages` are
    /// processed and the text is prefixed with a notice.
    pub max_ocr_pages: usize,

    /// Maximum rendered image dimension (width or height) for OCR pages. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Concurrent vision calls during page OCR. Default: 4.
    pub ocr_concurrency: usize,

    /// Per-page vision call timeout in seconds. Default: 60.
    ///
    /// Each page gets a single attempt; a failed or timed-out page is dropped.
    pub ocr_timeout_secs: u64,

    /// Accepted file extensions, lower-case with leading dot.
    ///
    /// An empty list accepts every extension.
    pub allowed_extensions: Vec<String>,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_file_size: u64,

    // ── Heuristic enrichment ─────────────────────────────────────────────
    /// Keywords kept by the lexical analyzer. Default: 10.
    pub max_keywords: usize,

    /// Category predictions kept. Default: 3.
    pub max_categories: usize,

    /// Minimum normalised category score (occurrences per 1000 chars). Default: 0.1.
    pub category_threshold: f64,

    /// Longest accepted title, in characters. Default: 100.
    pub title_max_length: usize,

    // ── Language model ───────────────────────────────────────────────────
    /// Use the language model for title, summary and correction. Default: false.
    pub llm_enabled: bool,

    /// Token budget for summary and correction. Default: 2048.
    pub llm_max_tokens: usize,

    /// Sampling temperature for summary and correction. Default: 0.7.
    pub llm_temperature: f32,

    /// Token budget for title generation. Default: 50.
    pub title_max_tokens: usize,

    /// Sampling temperature for title generation. Default: 0.5.
    pub title_temperature: f32,

    /// Document characters sent to summary/correction prompts. Default: 8000.
    pub max_llm_input_chars: usize,

    /// Document characters sent to the title prompt. Default: 2000.
    pub title_context_chars: usize,

    /// Timeout for one language model call, in seconds. Default: 120.
    pub llm_timeout_secs: u64,

    /// Model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    // ── Stage selection ──────────────────────────────────────────────────
    /// Enrichment stages to run. Empty means all.
    pub features: FeatureSet,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extraction_timeout_secs: 300,
            max_ocr_pages: 50,
            max_rendered_pixels: 2000,
            ocr_concurrency: 4,
            ocr_timeout_secs: 60,
            allowed_extensions: default_allowed_extensions(),
            max_file_size: 10 * 1024 * 1024,
            max_keywords: 10,
            max_categories: 3,
            category_threshold: 0.1,
            title_max_length: 100,
            llm_enabled: false,
            llm_max_tokens: 2048,
            llm_temperature: 0.7,
            title_max_tokens: 50,
            title_temperature: 0.5,
            max_llm_input_chars: 8000,
            title_context_chars: 2000,
            llm_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            features: FeatureSet::all(),
            progress_callback: None,
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    [
        ".pdf", ".docx", ".xlsx", ".txt", ".html", ".htm", ".md", ".csv",
        ".png", ".jpg", ".jpeg", ".tif", ".tiff", ".bmp", ".gif", ".webp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field("max_ocr_pages", &self.max_ocr_pages)
            .field("max_keywords", &self.max_keywords)
            .field("max_categories", &self.max_categories)
            .field("category_threshold", &self.category_threshold)
            .field("llm_enabled", &self.llm_enabled)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("llm_temperature", &self.llm_temperature)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("features", &self.features)
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether `filename` passes the extension allow-list.
    pub fn is_allowed(&self, filename: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let lower = filename.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lower.ends_with(ext.as_str()))
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction_timeout_secs = secs;
        self
    }

    pub fn max_ocr_pages(mut self, n: usize) -> Self {
        self.config.max_ocr_pages = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    /// Replace the extension allow-list. Entries are normalised to `.ext`.
    pub fn allowed_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.allowed_extensions = exts
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .filter(|e| e.len() > 1)
            .collect();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn max_keywords(mut self, n: usize) -> Self {
        self.config.max_keywords = n;
        self
    }

    pub fn max_categories(mut self, n: usize) -> Self {
        self.config.max_categories = n;
        self
    }

    pub fn category_threshold(mut self, t: f64) -> Self {
        self.config.category_threshold = t;
        self
    }

    pub fn title_max_length(mut self, n: usize) -> Self {
        self.config.title_max_length = n;
        self
    }

    pub fn llm_enabled(mut self, v: bool) -> Self {
        self.config.llm_enabled = v;
        self
    }

    pub fn llm_max_tokens(mut self, n: usize) -> Self {
        self.config.llm_max_tokens = n;
        self
    }

    pub fn llm_temperature(mut self, t: f32) -> Self {
        self.config.llm_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn title_max_tokens(mut self, n: usize) -> Self {
        self.config.title_max_tokens = n;
        self
    }

    pub fn title_temperature(mut self, t: f32) -> Self {
        self.config.title_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_llm_input_chars(mut self, n: usize) -> Self {
        self.config.max_llm_input_chars = n;
        self
    }

    pub fn title_context_chars(mut self, n: usize) -> Self {
        self.config.title_context_chars = n;
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs;
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

    pub fn features<I>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = Feature>,
    {
        self.config.features = FeatureSet::from_iter(features);
        self
    }

    pub fn feature_set(mut self, set: FeatureSet) -> Self {
        self.config.features = set;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.extraction_timeout_secs == 0 {
            return Err(IngestError::InvalidConfig(
                "Extraction timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_ocr_pages == 0 {
            return Err(IngestError::InvalidConfig(
                "max_ocr_pages must be ≥ 1".into(),
            ));
        }
        if !(0.0..=1000.0).contains(&c.category_threshold) || c.category_threshold.is_nan() {
            return Err(IngestError::InvalidConfig(format!(
                "category_threshold must be 0–1000, got {}",
                c.category_threshold
            )));
        }
        if c.max_file_size == 0 {
            return Err(IngestError::InvalidConfig(
                "max_file_size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Features ─────────────────────────────────────────────────────────────

/// One selectable enrichment stage.
///
/// Also used as the stage identifier in reports and stage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Title,
    Markdown,
    Category,
    Keyword,
    Severity,
    Summary,
    Correction,
}

impl Feature {
    /// Every feature, in report order.
    pub const ALL: [Feature; 7] = [
        Feature::Markdown,
        Feature::Title,
        Feature::Category,
        Feature::Keyword,
        Feature::Severity,
        Feature::Summary,
        Feature::Correction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Title => "title",
            Feature::Markdown => "markdown",
            Feature::Category => "category",
            Feature::Keyword => "keyword",
            Feature::Severity => "severity",
            Feature::Summary => "summary",
            Feature::Correction => "correction",
        }
    }

    /// Whether the stage can only run with a language model.
    pub fn requires_llm(self) -> bool {
        matches!(self, Feature::Summary | Feature::Correction)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title" => Ok(Feature::Title),
            "markdown" => Ok(Feature::Markdown),
            "category" | "categories" => Ok(Feature::Category),
            "keyword" | "keywords" => Ok(Feature::Keyword),
            "severity" => Ok(Feature::Severity),
            "summary" => Ok(Feature::Summary),
            "correction" => Ok(Feature::Correction),
            other => Err(IngestError::InvalidConfig(format!(
                "Unknown feature '{other}'"
            ))),
        }
    }
}

/// The selected subset of [`Feature`]s. An empty set selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(Vec<Feature>);

impl FeatureSet {
    /// The "everything" selection.
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.0.is_empty() || self.0.contains(&feature)
    }

    /// The features that will actually run, in report order.
    pub fn enabled(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|f| self.is_enabled(*f))
            .collect()
    }

    /// Parse a comma-separated list such as `"title, category"`.
    pub fn parse_list(s: &str) -> Result<Self, IngestError> {
        s.split(',')
            .filter(|p| !p.trim().is_empty())
            .map(Feature::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from_iter)
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        let mut v: Vec<Feature> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        Self(v)
    }
}
