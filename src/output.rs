//! Input and output data types of the ingestion pipeline.
//!
//! [`RawDocument`] goes in, one [`EnrichmentRecord`] comes out. Every
//! enrichment field of the record is an independent `Option`: a stage that
//! failed or was not selected leaves its own field empty and nothing else.

use crate::config::Feature;
use crate::error::StageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

// ── Input ────────────────────────────────────────────────────────────────

/// Declared kind of an uploaded file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Raster image: OCR is the only way in.
    Image,
    /// PDF: direct text when present, page OCR otherwise.
    Pdf,
    /// Plain-text family (txt, md, csv, html, …).
    Text,
    /// Office Open XML with a text converter (docx, xlsx).
    Office,
    /// Anything else; handed to the converter as-is.
    Other,
}

impl FileKind {
    /// Classify a lower- or mixed-case extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp" => FileKind::Image,
            "pdf" => FileKind::Pdf,
            "txt" | "text" | "md" | "markdown" | "csv" | "tsv" | "json" | "xml" | "html"
            | "htm" | "log" => FileKind::Text,
            "docx" | "xlsx" => FileKind::Office,
            _ => FileKind::Other,
        }
    }

    /// Classify a path by its extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(FileKind::Other)
    }
}

/// An uploaded document: bytes plus the name they arrived under.
///
/// Owned by a single request and dropped when the request finishes.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub kind: FileKind,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let kind = FileKind::from_path(Path::new(&filename));
        Self {
            filename,
            bytes,
            kind,
        }
    }

    /// Lower-case extension including the leading dot, or an empty string.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default()
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

/// How the text of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionMethod {
    Direct,
    Ocr,
}

/// Text extracted from one document. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
}

impl ExtractionResult {
    pub fn direct(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            method: ExtractionMethod::Direct,
        }
    }

    pub fn ocr(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            method: ExtractionMethod::Ocr,
        }
    }
}

/// Per-page OCR output for a page-bounded range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrPages {
    /// Text of each processed page, in page order. Blank for failed pages.
    pub pages: Vec<String>,
    /// Page count of the whole document.
    pub total_pages: usize,
}

// ── Predictions ──────────────────────────────────────────────────────────

/// One ranked category guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPrediction {
    pub category: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// At most five keyword phrases, in table order.
    pub matched_keywords: Vec<String>,
}

/// Urgency levels, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeverityLevel {
    Critical,
    Important,
    Normal,
    #[serde(rename = "Low Priority")]
    LowPriority,
}

impl SeverityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityLevel::Critical => "Critical",
            SeverityLevel::Important => "Important",
            SeverityLevel::Normal => "Normal",
            SeverityLevel::LowPriority => "Low Priority",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single severity verdict of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityPrediction {
    pub level: SeverityLevel,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// At most three keyword phrases of the winning level.
    pub matched_keywords: Vec<String>,
}

/// Counting statistics over a text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStatistics {
    pub characters: usize,
    pub words: usize,
    pub lines: usize,
    pub sentences: usize,
    pub paragraphs: usize,
    /// Rounded to one decimal; 0 when there are no sentences.
    pub avg_words_per_sentence: f64,
}

/// Where the record's title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSource {
    Llm,
    Heuristic,
}

// ── Stage results ────────────────────────────────────────────────────────

/// Result of one enrichment stage.
///
/// Expected "produced nothing" outcomes are values, not errors: the
/// orchestrator folds every outcome into the record and a report entry.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Produced(T),
    /// Not selected in the feature set.
    Skipped,
    Absent(StageError),
}

impl<T> StageOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            StageOutcome::Produced(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Produced(v) => StageOutcome::Produced(f(v)),
            StageOutcome::Skipped => StageOutcome::Skipped,
            StageOutcome::Absent(e) => StageOutcome::Absent(e),
        }
    }

    pub fn status(&self) -> StageStatus {
        match self {
            StageOutcome::Produced(_) => StageStatus::Produced,
            StageOutcome::Skipped => StageStatus::Skipped,
            StageOutcome::Absent(_) => StageStatus::Absent,
        }
    }

    pub fn error(&self) -> Option<&StageError> {
        match self {
            StageOutcome::Absent(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Produced,
    Skipped,
    Absent,
}

/// Report entry for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Feature,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StageError>,
    pub duration_ms: u64,
}

// ── Record ───────────────────────────────────────────────────────────────

/// The aggregated result of one upload.
///
/// Created once; a re-run of the same upload produces a new record with a
/// new id rather than updating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub id: Uuid,
    pub filename: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub extraction_method: ExtractionMethod,
    /// Extracted text (normalised when the `markdown` stage ran).
    pub markdown: String,
    pub title: Option<String>,
    pub title_source: Option<TitleSource>,
    pub categories: Option<Vec<CategoryPrediction>>,
    pub keywords: Option<Vec<String>>,
    pub severity: Option<SeverityPrediction>,
    pub summary: Option<String>,
    pub corrected: Option<String>,
    pub statistics: TextStatistics,
    pub stages: Vec<StageReport>,
    pub extraction_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl EnrichmentRecord {
    /// Report entry of `stage`, if the stage was considered at all.
    pub fn stage(&self, stage: Feature) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Stages that ended without output (failed, not skipped).
    pub fn absent_stages(&self) -> Vec<Feature> {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Absent)
            .map(|s| s.stage)
            .collect()
    }
}
