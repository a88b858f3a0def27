//! Error types for the edgequake-ingest library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`IngestError`]: **Fatal.** The upload cannot produce a record at all
//!   (unreadable input, extraction failed on every path, extraction timed
//!   out). Returned as `Err(IngestError)` from the `ingest*` entry points.
//!
//! * [`StageError`]: **Isolated.** One enrichment stage (title, category,
//!   summary, …) produced nothing. Stored in the record's stage report; the
//!   corresponding field is simply absent and every sibling stage is
//!   unaffected.
//!
//! * [`PageError`]: **Non-fatal.** A single page failed during OCR. The
//!   page is left out of the OCR text; the extraction only fails when every
//!   page failed.
//!
//! Fatal errors carry internal detail for logs. What a user gets to see is
//! [`IngestError::public_message`] plus the status from
//! [`IngestError::status`], never the detail itself.

use crate::config::Feature;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input exists but cannot be used (empty, too large, not UTF-8 …).
    #[error("Unreadable input '{name}': {reason}")]
    UnreadableInput { name: String, reason: String },

    /// The file extension is not accepted or no converter handles it.
    #[error("Unsupported file type '{extension}' for '{name}'")]
    UnsupportedFormat { name: String, extension: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Text extraction did not finish within the configured wall-clock budget.
    #[error("Extraction timed out after {secs}s for '{name}'")]
    ExtractionTimeout { name: String, secs: u64 },

    /// Every extraction path (direct and OCR) failed.
    #[error("Extraction failed for '{name}': {detail}")]
    ExtractionFailed { name: String, detail: String },

    /// pdfium reported the document as unreadable.
    #[error("Document '{path}' is corrupt: {detail}")]
    CorruptDocument { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// No vision-capable provider is available for OCR.
    #[error("OCR provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Store errors ──────────────────────────────────────────────────────
    /// Reading or writing the record store failed.
    #[error("Record store error at '{path}': {detail}")]
    StoreFailed { path: PathBuf, detail: String },

    /// No stored record has the requested id.
    #[error("Record '{id}' not found")]
    RecordNotFound { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure class surfaced to whoever submitted the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    /// Extraction ran out of time; the caller may re-submit.
    Timeout,
    /// The upload itself was rejected.
    BadRequest,
    /// A stored record lookup missed.
    NotFound,
    /// Anything else.
    Failed,
}

impl FailureStatus {
    /// HTTP status code a web layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            FailureStatus::Timeout => 504,
            FailureStatus::BadRequest => 400,
            FailureStatus::NotFound => 404,
            FailureStatus::Failed => 500,
        }
    }
}

impl IngestError {
    /// Classify the error for the user-facing status signal.
    pub fn status(&self) -> FailureStatus {
        match self {
            IngestError::ExtractionTimeout { .. } => FailureStatus::Timeout,
            IngestError::FileNotFound { .. }
            | IngestError::PermissionDenied { .. }
            | IngestError::UnreadableInput { .. }
            | IngestError::UnsupportedFormat { .. }
            | IngestError::CorruptDocument { .. } => FailureStatus::BadRequest,
            IngestError::RecordNotFound { .. } => FailureStatus::NotFound,
            _ => FailureStatus::Failed,
        }
    }

    /// Generic message safe to show to the uploader. Carries no internal detail.
    pub fn public_message(&self) -> &'static str {
        match self.status() {
            FailureStatus::Timeout => {
                "Processing took too long and was cancelled. Try a smaller document."
            }
            FailureStatus::BadRequest => "The uploaded file could not be processed.",
            FailureStatus::NotFound => "Record not found.",
            FailureStatus::Failed => "An error occurred during conversion.",
        }
    }
}

/// Why an enrichment stage produced no output.
///
/// Stored in [`crate::output::StageReport`]; the matching record field is
/// left absent.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The stage ran and reported an error.
    #[error("{stage}: {detail}")]
    Failed { stage: Feature, detail: String },

    /// The stage panicked; the panic was contained to the stage.
    #[error("{stage}: stage panicked: {detail}")]
    Panicked { stage: Feature, detail: String },

    /// The stage needs the language model and none is ready (or it is disabled).
    #[error("{stage}: language model unavailable")]
    LlmUnavailable { stage: Feature },

    /// The stage ran to completion but had nothing to report.
    #[error("{stage}: no result")]
    NoResult { stage: Feature },
}

impl StageError {
    /// The stage this error belongs to.
    pub fn stage(&self) -> Feature {
        match self {
            StageError::Failed { stage, .. }
            | StageError::Panicked { stage, .. }
            | StageError::LlmUnavailable { stage }
            | StageError::NoResult { stage } => *stage,
        }
    }
}

/// A language model call that did not return text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// The provider answered with an error.
    #[error("language model call failed: {0}")]
    Provider(String),

    /// The call exceeded `llm_timeout_secs`.
    #[error("language model call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A non-fatal error for a single OCR page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Vision call failed.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// Vision call timed out.
    #[error("Page {page}: OCR timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}
