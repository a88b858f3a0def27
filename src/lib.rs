//! # edgequake-ingest
//!
//! Turn uploaded documents into enriched, searchable records.
//!
//! An upload (PDF, image, text, HTML, DOCX or XLSX file) is converted to text, either
//! directly or by OCR with a vision model. The text then goes through a set
//! of independent enrichment stages: markdown cleanup, title, categories,
//! keywords, severity, summary and correction. The result is one
//! [`EnrichmentRecord`] per upload.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Input    validate extension/size, stage to a local path
//!  ├─ 2. Extract  direct text or page OCR, bounded by a timeout (fatal on failure)
//!  ├─ 3. Enrich   markdown, then title / category / keyword / severity /
//!  │              summary / correction concurrently (each may fail alone)
//!  ├─ 4. Record   aggregate outcomes + per-stage report
//!  └─ 5. Store    optional write-once persistence
//! ```
//!
//! Only extraction can fail a request. A stage that errors, panics, times out
//! or has no language model leaves its field empty and says why in
//! [`EnrichmentRecord::stages`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ingest::{ingest, Feature, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::builder()
//!         .features([Feature::Markdown, Feature::Title, Feature::Severity])
//!         .build()?;
//!     let record = ingest("incident.pdf", &config).await?;
//!     println!("{:?} ({:?})", record.title, record.severity.map(|s| s.level));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ingest` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ingest = { version = "0.1", default-features = false }
//! ```
//!
//! ## Language model
//!
//! Summary, correction and LLM titles need a loaded model (see
//! [`ModelService`]). Without one those stages report
//! `LlmUnavailable` and titles fall back to the heuristic chain. PDF OCR
//! and image uploads need a vision-capable provider; it is resolved from
//! the config or the environment on first use.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod enrich;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{
    extract_keywords, predict_categories, predict_severity, predict_title, text_statistics,
};
pub use config::{Feature, FeatureSet, IngestConfig, IngestConfigBuilder};
pub use enrich::{ingest, ingest_from_bytes, ingest_sync, Enricher};
pub use error::{FailureStatus, GenerationError, IngestError, PageError, StageError};
pub use model::{GenerationRequest, ModelInfo, ModelService, TextGenerator};
pub use output::{
    CategoryPrediction, EnrichmentRecord, ExtractionMethod, ExtractionResult, FileKind, OcrPages,
    RawDocument, SeverityLevel, SeverityPrediction, StageOutcome, StageReport, StageStatus,
    TextStatistics, TitleSource,
};
pub use pipeline::converter::{DocumentConverter, PdfiumConverter};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{JsonDirStore, MemoryStore, RecordStore};
