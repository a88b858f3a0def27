//! Integration tests for the ingestion pipeline.
//!
//! A scripted converter stands in for pdfium and the vision model, and a
//! scripted generator stands in for the language model, so these tests run
//! offline and deterministically.

use edgequake_ingest::model::LlmTask;
use edgequake_ingest::{
    DocumentConverter, Enricher, ExtractionMethod, FailureStatus, Feature, FileKind,
    GenerationError, GenerationRequest, IngestConfig, IngestError, IngestProgressCallback,
    MemoryStore, ModelService, OcrPages, RecordStore, SeverityLevel, StageError, StageStatus,
    TextGenerator, TitleSource,
};
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Converter with canned answers.
struct ScriptedConverter {
    has_text: bool,
    /// `None` makes `convert` fail.
    direct: Option<String>,
    /// `None` makes every OCR call fail.
    ocr_text: Option<String>,
    total_pages: usize,
    delay: Duration,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedConverter {
    fn text(direct: &str) -> Self {
        Self {
            has_text: true,
            direct: Some(direct.to_string()),
            ocr_text: None,
            total_pages: 1,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn scanned(ocr_text: &str, total_pages: usize) -> Self {
        Self {
            has_text: false,
            direct: None,
            ocr_text: Some(ocr_text.to_string()),
            total_pages,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl DocumentConverter for ScriptedConverter {
    fn convert<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, IngestError>> {
        Box::pin(async move {
            self.record("convert");
            tokio::time::sleep(self.delay).await;
            self.direct
                .clone()
                .ok_or_else(|| IngestError::CorruptDocument {
                    path: path.to_path_buf(),
                    detail: "broken xref table".into(),
                })
        })
    }

    fn probe_has_text<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.record("probe");
            self.has_text
        })
    }

    fn ocr_page_range<'a>(
        &'a self,
        path: &'a Path,
        max_pages: usize,
    ) -> BoxFuture<'a, Result<OcrPages, IngestError>> {
        Box::pin(async move {
            self.record("ocr_pages");
            let text = self
                .ocr_text
                .clone()
                .ok_or_else(|| IngestError::ExtractionFailed {
                    name: path.display().to_string(),
                    detail: "vision model unavailable".into(),
                })?;
            let processed = self.total_pages.min(max_pages);
            Ok(OcrPages {
                pages: (1..=processed).map(|n| format!("{text} {n}")).collect(),
                total_pages: self.total_pages,
            })
        })
    }

    fn ocr_image<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, IngestError>> {
        Box::pin(async move {
            self.record("ocr_image");
            self.ocr_text
                .clone()
                .ok_or_else(|| IngestError::ExtractionFailed {
                    name: path.display().to_string(),
                    detail: "vision model unavailable".into(),
                })
        })
    }
}

/// Generator that answers per task.
struct ScriptedGenerator {
    fail_summary: bool,
    panic_on_correct: bool,
    delay: Duration,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self {
            fail_summary: false,
            panic_on_correct: false,
            delay: Duration::ZERO,
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            match request.task {
                LlmTask::Title => Ok("\"Quarterly Numbers\"\n\nignored tail".to_string()),
                LlmTask::Summarize if self.fail_summary => {
                    Err(GenerationError::Provider("rate limited".into()))
                }
                LlmTask::Summarize => Ok("Revenue rose.<|im_end|>junk".to_string()),
                LlmTask::Correct if self.panic_on_correct => panic!("tokenizer blew up"),
                LlmTask::Correct => Ok("Corrected text.".to_string()),
            }
        })
    }
}

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl IngestProgressCallback for RecordingCallback {
    fn on_extraction_start(&self, filename: &str, _kind: FileKind) {
        self.events.lock().unwrap().push(format!("start {filename}"));
    }

    fn on_stage_complete(&self, stage: Feature) {
        self.events.lock().unwrap().push(format!("ok {stage}"));
    }

    fn on_stage_failed(&self, stage: Feature, _reason: &str) {
        self.events.lock().unwrap().push(format!("absent {stage}"));
    }

    fn on_ingest_complete(&self, produced: usize, selected: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {produced}/{selected}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const SCENARIO_A: &str =
    "# Q4 Report\n\nThis is urgent and critical. Please review immediately.";

/// Pipeline logs go to the test writer, so they only show for failing tests.
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("edgequake_ingest=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn enricher(config: IngestConfig, converter: ScriptedConverter) -> Enricher {
    init_tracing();
    Enricher::new(config).with_converter(Arc::new(converter))
}

fn llm_service(generator: ScriptedGenerator) -> Arc<ModelService> {
    Arc::new(ModelService::with_generator(
        Arc::new(generator),
        "scripted/test",
    ))
}

fn llm_config() -> IngestConfig {
    IngestConfig::builder().llm_enabled(true).build().unwrap()
}

// ── Scenario A: direct text, heuristics only ─────────────────────────────────

#[tokio::test]
async fn direct_text_is_enriched_heuristically() {
    let e = enricher(IngestConfig::default(), ScriptedConverter::text(SCENARIO_A));
    let record = e
        .ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    assert_eq!(record.extraction_method, ExtractionMethod::Direct);
    assert_eq!(record.title.as_deref(), Some("Q4 Report"));
    assert_eq!(record.title_source, Some(TitleSource::Heuristic));

    let severity = record.severity.as_ref().unwrap();
    assert_eq!(severity.level, SeverityLevel::Critical);
    assert_eq!(severity.confidence, 1.0);
    assert!(severity.matched_keywords.contains(&"urgent".to_string()));
    assert!(severity.matched_keywords.contains(&"critical".to_string()));

    let categories = record.categories.as_ref().unwrap();
    assert!(categories.iter().any(|c| c.category == "Report"));

    assert!(record.keywords.as_ref().unwrap().contains(&"urgent".to_string()));
    assert_eq!(record.file_size, SCENARIO_A.len() as u64);
    assert_eq!(record.statistics.paragraphs, 2);
    assert!(record.markdown.ends_with('\n'));
    assert_eq!(
        record.absent_stages(),
        vec![Feature::Summary, Feature::Correction]
    );
}

// ── Scenario B: scanned PDF beyond the OCR page cap ──────────────────────────

#[tokio::test]
async fn scanned_pdf_is_capped_with_notice() {
    let config = IngestConfig::builder().max_ocr_pages(50).build().unwrap();
    let e = enricher(config, ScriptedConverter::scanned("Scanned text", 120));
    let record = e
        .ingest_bytes("scan.pdf", b"%PDF-1.7 fake".to_vec())
        .await
        .unwrap();

    assert_eq!(record.extraction_method, ExtractionMethod::Ocr);
    assert!(record
        .markdown
        .starts_with("*Note: Only the first 50 of 120 pages were processed with OCR.*"));
    assert!(record.markdown.contains("*Text extracted using OCR*"));
    assert!(record.markdown.contains("## Page 50"));
    assert!(!record.markdown.contains("## Page 51"));
}

// ── Scenario C: extraction timeout ───────────────────────────────────────────

#[tokio::test]
async fn slow_extraction_times_out_and_persists_nothing() {
    let config = IngestConfig::builder()
        .extraction_timeout_secs(1)
        .build()
        .unwrap();
    let mut converter = ScriptedConverter::text("never seen");
    converter.delay = Duration::from_secs(5);

    let store = Arc::new(MemoryStore::new());
    let e = enricher(config, converter).with_store(store.clone());

    let err = e
        .ingest_bytes("slow.txt", b"some text".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ExtractionTimeout { secs: 1, .. }));
    assert_eq!(err.status(), FailureStatus::Timeout);
    assert!(!err.public_message().contains("slow.txt"));
    assert!(store.is_empty());
}

// ── Scenario D: no language model ────────────────────────────────────────────

#[tokio::test]
async fn title_absent_when_no_strategy_matches() {
    let e = enricher(IngestConfig::default(), ScriptedConverter::text("ok."));
    let record = e.ingest_bytes("tiny.txt", b"ok.".to_vec()).await.unwrap();

    assert!(record.title.is_none());
    assert_eq!(
        record.stage(Feature::Title).unwrap().reason,
        Some(StageError::NoResult {
            stage: Feature::Title
        })
    );
    assert!(record.severity.is_some());
    assert!(record.categories.is_some());
    assert_eq!(record.statistics.sentences, 1);
}

// ── Language model stages ────────────────────────────────────────────────────

#[tokio::test]
async fn llm_stages_use_loaded_model() {
    let e = enricher(llm_config(), ScriptedConverter::text(SCENARIO_A))
        .with_model(llm_service(ScriptedGenerator::default()));
    let record = e
        .ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    assert_eq!(record.title.as_deref(), Some("Quarterly Numbers"));
    assert_eq!(record.title_source, Some(TitleSource::Llm));
    assert_eq!(record.summary.as_deref(), Some("Revenue rose."));
    assert_eq!(record.corrected.as_deref(), Some("Corrected text."));
    assert!(record.absent_stages().is_empty());
}

#[tokio::test]
async fn llm_disabled_ignores_loaded_model() {
    let e = enricher(IngestConfig::default(), ScriptedConverter::text(SCENARIO_A))
        .with_model(llm_service(ScriptedGenerator::default()));
    let record = e
        .ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    assert_eq!(record.title_source, Some(TitleSource::Heuristic));
    assert!(record.summary.is_none());
    assert_eq!(
        record.stage(Feature::Correction).unwrap().reason,
        Some(StageError::LlmUnavailable {
            stage: Feature::Correction
        })
    );
}

#[tokio::test]
async fn failing_summary_does_not_affect_other_stages() {
    let generator = ScriptedGenerator {
        fail_summary: true,
        ..Default::default()
    };
    let store = Arc::new(MemoryStore::new());
    let e = enricher(llm_config(), ScriptedConverter::text(SCENARIO_A))
        .with_model(llm_service(generator))
        .with_store(store.clone());
    let record = e
        .ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    assert!(record.summary.is_none());
    match &record.stage(Feature::Summary).unwrap().reason {
        Some(StageError::Failed { detail, .. }) => assert!(detail.contains("rate limited")),
        other => panic!("unexpected reason {other:?}"),
    }
    assert_eq!(record.corrected.as_deref(), Some("Corrected text."));
    assert_eq!(record.title.as_deref(), Some("Quarterly Numbers"));
    assert!(record.severity.is_some());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn panicking_stage_is_isolated() {
    let generator = ScriptedGenerator {
        panic_on_correct: true,
        ..Default::default()
    };
    let e = enricher(llm_config(), ScriptedConverter::text(SCENARIO_A))
        .with_model(llm_service(generator));
    let record = e
        .ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    assert!(record.corrected.is_none());
    match &record.stage(Feature::Correction).unwrap().reason {
        Some(StageError::Panicked { detail, .. }) => assert!(detail.contains("tokenizer")),
        other => panic!("unexpected reason {other:?}"),
    }
    assert_eq!(record.summary.as_deref(), Some("Revenue rose."));
}

#[tokio::test]
async fn slow_model_call_is_bounded() {
    let config = IngestConfig::builder()
        .llm_enabled(true)
        .llm_timeout_secs(1)
        .features([Feature::Summary, Feature::Keyword])
        .build()
        .unwrap();
    let generator = ScriptedGenerator {
        delay: Duration::from_secs(3),
        ..Default::default()
    };
    let e = enricher(config, ScriptedConverter::text(SCENARIO_A))
        .with_model(llm_service(generator));
    let record = e
        .ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    assert!(record.summary.is_none());
    match &record.stage(Feature::Summary).unwrap().reason {
        Some(StageError::Failed { detail, .. }) => assert!(detail.contains("timed out")),
        other => panic!("unexpected reason {other:?}"),
    }
    assert!(record.keywords.is_some());
}

// ── Feature selection ────────────────────────────────────────────────────────

#[tokio::test]
async fn unselected_stages_are_skipped() {
    let config = IngestConfig::builder()
        .features([Feature::Title, Feature::Severity])
        .build()
        .unwrap();
    let e = enricher(config, ScriptedConverter::text(SCENARIO_A));
    let record = e
        .ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    assert!(record.title.is_some());
    assert!(record.severity.is_some());
    assert!(record.categories.is_none());
    assert!(record.keywords.is_none());
    assert_eq!(
        record.stage(Feature::Category).unwrap().status,
        StageStatus::Skipped
    );
    // Markdown normalisation was not selected: raw text is kept.
    assert_eq!(record.markdown, SCENARIO_A);
    assert!(record.absent_stages().is_empty());
}

#[tokio::test]
async fn rerun_is_deterministic_but_creates_new_record() {
    let store = Arc::new(MemoryStore::new());
    let e = enricher(IngestConfig::default(), ScriptedConverter::text(SCENARIO_A))
        .with_store(store.clone());

    let first = e.ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec()).await.unwrap();
    let second = e.ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec()).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.markdown, second.markdown);
    assert_eq!(first.title, second.title);
    assert_eq!(first.categories, second.categories);
    assert_eq!(first.keywords, second.keywords);
    assert_eq!(first.severity, second.severity);
    assert_eq!(first.statistics, second.statistics);

    assert_eq!(store.len(), 2);
    assert_eq!(store.get(first.id).await.unwrap(), first);
    assert_eq!(store.recent(1).await.unwrap().len(), 1);
}

// ── Extraction policy ────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_with_text_uses_direct_extraction() {
    let converter = Arc::new(ScriptedConverter::text("Embedded text here."));
    let e = Enricher::new(IngestConfig::default()).with_converter(converter.clone());
    let record = e
        .ingest_bytes("doc.pdf", b"%PDF-1.4 data".to_vec())
        .await
        .unwrap();

    assert_eq!(record.extraction_method, ExtractionMethod::Direct);
    assert_eq!(converter.calls(), vec!["probe", "convert"]);
}

#[tokio::test]
async fn failed_direct_extraction_falls_back_to_ocr() {
    let mut scripted = ScriptedConverter::scanned("Recovered", 2);
    scripted.has_text = true;
    let converter = Arc::new(scripted);
    let e = Enricher::new(IngestConfig::default()).with_converter(converter.clone());
    let record = e
        .ingest_bytes("doc.pdf", b"%PDF-1.4 data".to_vec())
        .await
        .unwrap();

    assert_eq!(record.extraction_method, ExtractionMethod::Ocr);
    assert!(record.markdown.contains("Recovered 2"));
    assert_eq!(converter.calls(), vec!["probe", "convert", "ocr_pages"]);
}

#[tokio::test]
async fn blank_direct_extraction_falls_back_to_ocr() {
    let mut scripted = ScriptedConverter::scanned("Recovered", 1);
    scripted.has_text = true;
    scripted.direct = Some("   \n".into());
    let e = enricher(IngestConfig::default(), scripted);
    let record = e
        .ingest_bytes("doc.pdf", b"%PDF-1.4 data".to_vec())
        .await
        .unwrap();
    assert_eq!(record.extraction_method, ExtractionMethod::Ocr);
}

#[tokio::test]
async fn both_extraction_paths_failing_is_fatal() {
    let mut scripted = ScriptedConverter::text("");
    scripted.direct = None;
    let store = Arc::new(MemoryStore::new());
    let e = enricher(IngestConfig::default(), scripted).with_store(store.clone());

    let err = e
        .ingest_bytes("doc.pdf", b"%PDF-1.4 data".to_vec())
        .await
        .unwrap_err();
    match &err {
        IngestError::ExtractionFailed { detail, .. } => {
            assert!(detail.contains("direct:"));
            assert!(detail.contains("ocr:"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.status(), FailureStatus::Failed);
    assert!(store.is_empty());
}

#[tokio::test]
async fn image_upload_goes_straight_to_ocr() {
    let converter = Arc::new(ScriptedConverter::scanned("Receipt total 12.50", 1));
    let e = Enricher::new(IngestConfig::default()).with_converter(converter.clone());
    let record = e
        .ingest_bytes("receipt.png", vec![0x89, b'P', b'N', b'G'])
        .await
        .unwrap();

    assert_eq!(record.extraction_method, ExtractionMethod::Ocr);
    assert!(record.markdown.starts_with("Receipt total"));
    assert_eq!(converter.calls(), vec!["ocr_image"]);
}

// ── Input validation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_uploads_never_reach_the_converter() {
    let converter = Arc::new(ScriptedConverter::text("x"));
    let e = Enricher::new(IngestConfig::default()).with_converter(converter.clone());

    let err = e.ingest_bytes("tool.exe", b"MZ".to_vec()).await.unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    assert_eq!(err.status(), FailureStatus::BadRequest);

    let err = e.ingest_bytes("empty.txt", Vec::new()).await.unwrap_err();
    assert!(matches!(err, IngestError::UnreadableInput { .. }));

    let err = e
        .ingest_bytes("fake.pdf", b"not a pdf".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnreadableInput { .. }));

    let err = e.ingest_path("/definitely/missing.txt").await.unwrap_err();
    assert!(matches!(err, IngestError::FileNotFound { .. }));

    assert!(converter.calls().is_empty());
}

#[tokio::test]
async fn local_file_is_ingested_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memo.md");
    std::fs::write(&path, SCENARIO_A).unwrap();

    let e = enricher(IngestConfig::default(), ScriptedConverter::text(SCENARIO_A));
    let record = e.ingest_path(&path).await.unwrap();
    assert_eq!(record.filename, "memo.md");
    assert!(path.exists());
}

// ── Office documents through the default converter ───────────────────────────

#[tokio::test]
async fn docx_upload_is_enriched() {
    use docx_rs::{Docx, Paragraph, Run};

    init_tracing();
    let mut buf = std::io::Cursor::new(Vec::new());
    Docx::new()
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Title: Boiler inspection")))
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(
            "The inspection is urgent. Replace the relief valve immediately.",
        )))
        .build()
        .pack(&mut buf)
        .unwrap();

    let record = Enricher::new(IngestConfig::default())
        .ingest_bytes("inspection.docx", buf.into_inner())
        .await
        .unwrap();
    assert_eq!(record.extraction_method, ExtractionMethod::Direct);
    assert_eq!(record.title.as_deref(), Some("Boiler inspection"));
    assert_eq!(
        record.severity.as_ref().map(|s| s.level),
        Some(SeverityLevel::Critical)
    );
    assert!(record.markdown.contains("relief valve"));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_events_cover_every_selected_stage() {
    let cb = Arc::new(RecordingCallback::default());
    let config = IngestConfig::builder()
        .features([Feature::Markdown, Feature::Title, Feature::Summary])
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let e = enricher(config, ScriptedConverter::text(SCENARIO_A));
    e.ingest_bytes("q4.txt", SCENARIO_A.as_bytes().to_vec())
        .await
        .unwrap();

    let events = cb.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("start q4.txt"));
    assert_eq!(events.last().map(String::as_str), Some("done 2/3"));
    assert!(events.contains(&"ok markdown".to_string()));
    assert!(events.contains(&"ok title".to_string()));
    assert!(events.contains(&"absent summary".to_string()));
    assert!(!events.iter().any(|e| e.contains("severity")));
}
