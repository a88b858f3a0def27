//! Extraction policy and its timeout boundary.
//!
//! ```text
//! image ─────────────────────────────────▶ ocr_image
//! pdf ──▶ probe_has_text ─ yes ─▶ convert ─ blank / error ─┐
//!                        └ no ──────────────────────────────┴▶ ocr_page_range
//! text / other ──────────────────────────▶ convert
//! ```
//!
//! The whole policy runs as one spawned task. [`extract_with_timeout`] waits
//! for it up to `extraction_timeout_secs`, then aborts the task and reports
//! [`IngestError::ExtractionTimeout`]. Blocking pdfium work already handed to
//! the blocking pool is abandoned rather than killed; its result is dropped.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::output::{ExtractionResult, FileKind, OcrPages};
use crate::pipeline::converter::DocumentConverter;
use crate::pipeline::input::StagedInput;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Marker line put in front of OCR'd PDF text.
pub const OCR_MARKER: &str = "*Text extracted using OCR*\n\n";

/// Text used when OCR ran but every page came back empty.
pub const NO_TEXT_EXTRACTED: &str = "No text could be extracted from the PDF.";

/// Assemble per-page OCR output into one document.
///
/// Pages become `## Page N` sections separated by `---`; blank pages are
/// skipped. A capped run is prefixed with a notice naming how many of the
/// document's pages were processed.
pub fn format_ocr_pages(ocr: &OcrPages) -> String {
    let sections: Vec<String> = ocr
        .pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(idx, text)| format!("## Page {}\n\n{}", idx + 1, text.trim()))
        .collect();

    let body = if sections.is_empty() {
        NO_TEXT_EXTRACTED.to_string()
    } else {
        sections.join("\n\n---\n\n")
    };

    let mut out = String::new();
    if ocr.total_pages > ocr.pages.len() {
        out.push_str(&format!(
            "*Note: Only the first {} of {} pages were processed with OCR.*\n\n",
            ocr.pages.len(),
            ocr.total_pages
        ));
    }
    out.push_str(OCR_MARKER);
    out.push_str(&body);
    out
}

async fn ocr_document(
    converter: &dyn DocumentConverter,
    path: &Path,
    config: &IngestConfig,
) -> Result<ExtractionResult, IngestError> {
    let pages = converter.ocr_page_range(path, config.max_ocr_pages).await?;
    if pages.pages.len() > config.max_ocr_pages {
        return Err(IngestError::Internal(format!(
            "converter returned {} OCR pages, limit is {}",
            pages.pages.len(),
            config.max_ocr_pages
        )));
    }
    Ok(ExtractionResult::ocr(format_ocr_pages(&pages)))
}

/// Run the extraction policy for one file, without a time limit.
pub async fn extract_text(
    converter: &dyn DocumentConverter,
    path: &Path,
    name: &str,
    kind: FileKind,
    config: &IngestConfig,
) -> Result<ExtractionResult, IngestError> {
    if kind == FileKind::Image {
        info!("'{}': image upload, extracting with OCR", name);
        let text = converter.ocr_image(path).await?;
        return Ok(ExtractionResult::ocr(text));
    }

    if !converter.supports_text_probe(kind) {
        let text = converter.convert(path).await?;
        return Ok(ExtractionResult::direct(text));
    }

    if !converter.probe_has_text(path).await {
        info!("'{}': no embedded text, extracting with OCR", name);
        return ocr_document(converter, path, config).await;
    }

    let direct_err = match converter.convert(path).await {
        Ok(text) if !text.trim().is_empty() => return Ok(ExtractionResult::direct(text)),
        Ok(_) => "direct extraction returned no text".to_string(),
        Err(e) => e.to_string(),
    };
    warn!("'{}': {}; falling back to OCR", name, direct_err);

    ocr_document(converter, path, config)
        .await
        .map_err(|ocr_err| IngestError::ExtractionFailed {
            name: name.to_string(),
            detail: format!("direct: {direct_err}; ocr: {ocr_err}"),
        })
}

/// Run [`extract_text`] as a separate task bounded by
/// `config.extraction_timeout_secs`.
pub async fn extract_with_timeout(
    converter: Arc<dyn DocumentConverter>,
    input: &StagedInput,
    config: &IngestConfig,
) -> Result<ExtractionResult, IngestError> {
    let secs = config.extraction_timeout_secs;
    let path = input.path().to_path_buf();
    let name = input.filename.clone();
    let kind = input.kind;
    let task_config = config.clone();

    let handle = tokio::spawn(async move {
        extract_text(converter.as_ref(), &path, &name, kind, &task_config).await
    });
    let abort = handle.abort_handle();

    match tokio::time::timeout(Duration::from_secs(secs), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(IngestError::Internal(format!(
            "extraction task failed: {join_err}"
        ))),
        Err(_) => {
            abort.abort();
            error!("'{}': extraction timed out after {}s", input.filename, secs);
            Err(IngestError::ExtractionTimeout {
                name: input.filename.clone(),
                secs,
            })
        }
    }
}
