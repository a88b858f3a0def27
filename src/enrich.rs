//! Enrichment orchestrator: one upload in, one [`EnrichmentRecord`] out.
//!
//! ```text
//! RECEIVED ──▶ EXTRACTED ──▶ markdown ──▶ ┬ title      ┬──▶ AGGREGATED ──▶ store
//!  (stage)     (timeout-     (normalise)  ├ category   │
//!               bounded)                  ├ keyword    │
//!                                         ├ severity   │
//!                                         ├ summary    │
//!                                         └ correction ┘
//! ```
//!
//! Only the step into `EXTRACTED` can fail the request. Every enrichment
//! stage returns a [`StageOutcome`]; errors and panics inside a stage are
//! caught at the stage boundary, logged, and recorded in the stage report
//! while the matching record field stays empty. Stages after `markdown` do
//! not read each other's output and run concurrently.

use crate::analysis::{
    extract_keywords, predict_categories, predict_severity, predict_title, text_statistics,
};
use crate::config::{Feature, IngestConfig};
use crate::error::{GenerationError, IngestError, StageError};
use crate::model::{clean_title, GenerationRequest, ModelService};
use crate::output::{
    EnrichmentRecord, ExtractionResult, RawDocument, StageOutcome, StageReport, StageStatus,
    TitleSource,
};
use crate::pipeline::converter::{DocumentConverter, PdfiumConverter};
use crate::pipeline::extract::extract_with_timeout;
use crate::pipeline::input::{self, StagedInput};
use crate::pipeline::postprocess::normalise_markdown;
use crate::store::RecordStore;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A stage outcome plus its wall time.
struct Timed<T> {
    outcome: StageOutcome<T>,
    duration_ms: u64,
}

impl<T> Timed<T> {
    fn skipped() -> Self {
        Self {
            outcome: StageOutcome::Skipped,
            duration_ms: 0,
        }
    }

    fn report(&self, stage: Feature) -> StageReport {
        StageReport {
            stage,
            status: self.outcome.status(),
            reason: self.outcome.error().cloned(),
            duration_ms: self.duration_ms,
        }
    }
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a pure analyzer on the blocking pool.
///
/// `None` from the analyzer means "nothing to report"; a panic is contained
/// and reported as [`StageError::Panicked`].
async fn run_blocking_stage<T, F>(stage: Feature, text: Arc<str>, f: F) -> StageOutcome<T>
where
    T: Send + 'static,
    F: FnOnce(&str) -> Option<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&text)).await {
        Ok(Some(v)) => StageOutcome::Produced(v),
        Ok(None) => StageOutcome::Absent(StageError::NoResult { stage }),
        Err(e) if e.is_panic() => StageOutcome::Absent(StageError::Panicked {
            stage,
            detail: panic_detail(e.into_panic()),
        }),
        Err(e) => StageOutcome::Absent(StageError::Failed {
            stage,
            detail: e.to_string(),
        }),
    }
}

/// Runs the pipeline for one upload at a time; cheap to share behind an `Arc`.
pub struct Enricher {
    config: IngestConfig,
    converter: Arc<dyn DocumentConverter>,
    model: Arc<ModelService>,
    store: Option<Arc<dyn RecordStore>>,
}

impl Enricher {
    /// pdfium converter, no model loaded, no store.
    pub fn new(config: IngestConfig) -> Self {
        let converter = Arc::new(PdfiumConverter::new(config.clone()));
        Self {
            config,
            converter,
            model: Arc::new(ModelService::new()),
            store: None,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_model(mut self, model: Arc<ModelService>) -> Self {
        self.model = model;
        self
    }

    /// Persist every successful record to `store`.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<ModelService> {
        &self.model
    }

    // ── Entry points ─────────────────────────────────────────────────────

    /// Ingest a local file.
    pub async fn ingest_path(&self, path: impl AsRef<Path>) -> Result<EnrichmentRecord, IngestError> {
        let staged = input::stage_path(path.as_ref(), &self.config)?;
        self.ingest_staged(staged).await
    }

    /// Ingest an in-memory upload.
    pub async fn ingest_bytes(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<EnrichmentRecord, IngestError> {
        self.ingest_document(&RawDocument::new(filename, bytes)).await
    }

    pub async fn ingest_document(&self, doc: &RawDocument) -> Result<EnrichmentRecord, IngestError> {
        let staged = input::stage_bytes(doc, &self.config)?;
        self.ingest_staged(staged).await
    }

    async fn ingest_staged(&self, staged: StagedInput) -> Result<EnrichmentRecord, IngestError> {
        let start = Instant::now();
        let progress = self.config.progress_callback.clone();
        info!("Ingesting '{}' ({:?}, {} bytes)", staged.filename, staged.kind, staged.file_size);

        if let Some(ref cb) = progress {
            cb.on_extraction_start(&staged.filename, staged.kind);
        }

        let extraction =
            match extract_with_timeout(Arc::clone(&self.converter), &staged, &self.config).await {
                Ok(e) => e,
                Err(e) => {
                    error!("Extraction failed for '{}': {}", staged.filename, e);
                    return Err(e);
                }
            };
        let extraction_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extracted {} chars from '{}' via {:?} in {}ms",
            extraction.text.chars().count(),
            staged.filename,
            extraction.method,
            extraction_duration_ms
        );
        if let Some(ref cb) = progress {
            cb.on_extraction_complete(extraction.method, extraction.text.chars().count());
        }

        let filename = staged.filename.clone();
        let file_size = staged.file_size;
        drop(staged);

        let mut record = self.enrich(extraction, &filename, file_size).await;
        record.extraction_duration_ms = extraction_duration_ms;
        record.total_duration_ms = start.elapsed().as_millis() as u64;

        if let Some(ref store) = self.store {
            store.save(&record).await.inspect_err(|e| {
                error!("Failed to persist record {}: {}", record.id, e);
            })?;
        }

        info!(
            "Ingested '{}' as {} in {}ms",
            record.filename, record.id, record.total_duration_ms
        );
        Ok(record)
    }

    // ── Enrichment ───────────────────────────────────────────────────────

    /// Run every selected enrichment stage over an extraction.
    ///
    /// Never fails: a stage that produces nothing leaves its field empty.
    pub async fn enrich(
        &self,
        extraction: ExtractionResult,
        filename: &str,
        file_size: u64,
    ) -> EnrichmentRecord {
        let start = Instant::now();
        let ExtractionResult { text: raw, method } = extraction;

        let markdown_stage = self
            .run_stage(
                Feature::Markdown,
                run_blocking_stage(Feature::Markdown, Arc::from(raw.as_str()), |t| {
                    Some(normalise_markdown(t))
                }),
            )
            .await;
        let markdown = match &markdown_stage.outcome {
            StageOutcome::Produced(text) => text.clone(),
            _ => raw,
        };
        let text: Arc<str> = Arc::from(markdown.as_str());

        let max_categories = self.config.max_categories;
        let threshold = self.config.category_threshold;
        let max_keywords = self.config.max_keywords;

        let (title, categories, keywords, severity, summary, corrected) = futures::join!(
            self.run_stage(Feature::Title, self.title_stage(Arc::clone(&text))),
            self.run_stage(
                Feature::Category,
                run_blocking_stage(Feature::Category, Arc::clone(&text), move |t| {
                    Some(predict_categories(t, max_categories, threshold))
                }),
            ),
            self.run_stage(
                Feature::Keyword,
                run_blocking_stage(Feature::Keyword, Arc::clone(&text), move |t| {
                    Some(extract_keywords(t, max_keywords))
                }),
            ),
            self.run_stage(
                Feature::Severity,
                run_blocking_stage(Feature::Severity, Arc::clone(&text), |t| {
                    Some(predict_severity(t))
                }),
            ),
            self.run_stage(
                Feature::Summary,
                self.llm_stage(Feature::Summary, &text, GenerationRequest::summarize),
            ),
            self.run_stage(
                Feature::Correction,
                self.llm_stage(Feature::Correction, &text, GenerationRequest::correct),
            ),
        );

        let stages = vec![
            markdown_stage.report(Feature::Markdown),
            title.report(Feature::Title),
            categories.report(Feature::Category),
            keywords.report(Feature::Keyword),
            severity.report(Feature::Severity),
            summary.report(Feature::Summary),
            corrected.report(Feature::Correction),
        ];

        let produced = stages
            .iter()
            .filter(|s| s.status == StageStatus::Produced)
            .count();
        let selected = stages
            .iter()
            .filter(|s| s.status != StageStatus::Skipped)
            .count();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_ingest_complete(produced, selected);
        }
        debug!("{}/{} selected stages produced output", produced, selected);

        let (title, title_source) = match title.outcome.into_option() {
            Some((t, source)) => (Some(t), Some(source)),
            None => (None, None),
        };

        EnrichmentRecord {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            file_size,
            created_at: Utc::now(),
            extraction_method: method,
            statistics: text_statistics(&markdown),
            markdown,
            title,
            title_source,
            categories: categories.outcome.into_option(),
            keywords: keywords.outcome.into_option(),
            severity: severity.outcome.into_option(),
            summary: summary.outcome.into_option(),
            corrected: corrected.outcome.into_option(),
            stages,
            extraction_duration_ms: 0,
            total_duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Stage boundary: feature gate, progress events, timing, panic capture.
    async fn run_stage<T, Fut>(&self, stage: Feature, fut: Fut) -> Timed<T>
    where
        Fut: Future<Output = StageOutcome<T>>,
    {
        if !self.config.features.is_enabled(stage) {
            debug!(stage = %stage, "Stage not selected");
            return Timed::skipped();
        }

        let progress = self.config.progress_callback.as_ref();
        if let Some(cb) = progress {
            cb.on_stage_start(stage);
        }

        let start = Instant::now();
        let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => StageOutcome::Absent(StageError::Panicked {
                stage,
                detail: panic_detail(payload),
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome.error() {
            None => {
                debug!(stage = %stage, duration_ms, "Stage produced output");
                if let Some(cb) = progress {
                    cb.on_stage_complete(stage);
                }
            }
            Some(reason) => {
                warn!(stage = %stage, reason = %reason, "Stage produced no output");
                if let Some(cb) = progress {
                    cb.on_stage_failed(stage, &reason.to_string());
                }
            }
        }

        Timed {
            outcome,
            duration_ms,
        }
    }

    fn llm_available(&self) -> bool {
        self.config.llm_enabled && self.model.is_ready()
    }

    async fn generate_bounded(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        let secs = self.config.llm_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), self.model.generate(request))
            .await
            .map_err(|_| GenerationError::Timeout { secs })?
    }

    /// Language model title, falling back to the heuristic chain.
    async fn title_stage(&self, text: Arc<str>) -> StageOutcome<(String, TitleSource)> {
        if self.llm_available() {
            let request = GenerationRequest::title(&text, &self.config);
            match self.generate_bounded(&request).await {
                Ok(Some(raw)) => {
                    if let Some(title) = clean_title(&raw) {
                        return StageOutcome::Produced((title, TitleSource::Llm));
                    }
                    debug!("Generated title was empty; using heuristic");
                }
                Ok(None) => debug!("No generated title; using heuristic"),
                Err(e) => warn!("Title generation failed ({e}); using heuristic"),
            }
        }

        let max_length = self.config.title_max_length;
        run_blocking_stage(Feature::Title, text, move |t| predict_title(t, max_length))
            .await
            .map(|title| (title, TitleSource::Heuristic))
    }

    /// A stage that only the language model can produce.
    async fn llm_stage(
        &self,
        stage: Feature,
        text: &str,
        build: fn(&str, &IngestConfig) -> GenerationRequest,
    ) -> StageOutcome<String> {
        if !self.llm_available() {
            return StageOutcome::Absent(StageError::LlmUnavailable { stage });
        }
        let request = build(text, &self.config);
        match self.generate_bounded(&request).await {
            Ok(Some(output)) => StageOutcome::Produced(output),
            Ok(None) => StageOutcome::Absent(StageError::NoResult { stage }),
            Err(e) => StageOutcome::Absent(StageError::Failed {
                stage,
                detail: e.to_string(),
            }),
        }
    }
}

// ── Convenience functions ────────────────────────────────────────────────

fn enricher_for(config: &IngestConfig) -> Enricher {
    let enricher = Enricher::new(config.clone());
    if config.llm_enabled {
        if let Err(e) = enricher.model().load(config) {
            warn!("Language model unavailable, LLM stages will be skipped: {e}");
        }
    }
    enricher
}

/// Ingest a local file with the default pdfium converter.
///
/// When `config.llm_enabled` is set the configured provider is loaded first;
/// if that fails the LLM stages report the model as unavailable.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ingest::{ingest, IngestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let record = ingest("report.pdf", &IngestConfig::default()).await?;
/// println!("{:?} / {:?}", record.title, record.severity);
/// # Ok(())
/// # }
/// ```
pub async fn ingest(
    path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<EnrichmentRecord, IngestError> {
    enricher_for(config).ingest_path(path).await
}

/// Ingest an in-memory upload. See [`ingest`].
pub async fn ingest_from_bytes(
    filename: &str,
    bytes: &[u8],
    config: &IngestConfig,
) -> Result<EnrichmentRecord, IngestError> {
    enricher_for(config)
        .ingest_bytes(filename, bytes.to_vec())
        .await
}

/// Synchronous wrapper around [`ingest`].
///
/// Creates a temporary tokio runtime internally.
pub fn ingest_sync(
    path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<EnrichmentRecord, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest(path, config))
}
