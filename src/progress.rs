//! Progress-callback trait for ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! events while a document is extracted and enriched.
//!
//! Callers forward the events wherever they need them: a terminal spinner,
//! a websocket, a job table. The trait is `Send + Sync` because enrichment
//! stages run concurrently and may report from different threads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ingest::{Feature, IngestConfig, IngestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl IngestProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Feature) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{stage} done ({n} so far)");
//!     }
//! }
//!
//! let config = IngestConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::config::Feature;
use crate::output::{ExtractionMethod, FileKind};
use std::sync::Arc;

/// Called by the pipeline as it moves through a document.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once, before extraction starts.
    fn on_extraction_start(&self, filename: &str, kind: FileKind) {
        let _ = (filename, kind);
    }

    /// Called when an OCR page finished (successfully or not).
    ///
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: pages that will be processed
    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called once extraction produced text.
    fn on_extraction_complete(&self, method: ExtractionMethod, chars: usize) {
        let _ = (method, chars);
    }

    /// Called just before an enrichment stage runs.
    fn on_stage_start(&self, stage: Feature) {
        let _ = stage;
    }

    /// Called when a stage produced its output.
    fn on_stage_complete(&self, stage: Feature) {
        let _ = stage;
    }

    /// Called when a stage ended without output.
    fn on_stage_failed(&self, stage: Feature, reason: &str) {
        let _ = (stage, reason);
    }

    /// Called once after all stages.
    ///
    /// * `produced`: stages that produced output
    /// * `selected`: stages that were selected to run
    fn on_ingest_complete(&self, produced: usize, selected: usize) {
        let _ = (produced, selected);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;
