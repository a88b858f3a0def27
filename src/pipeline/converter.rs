//! The converter collaborator: file path in, text out.
//!
//! [`DocumentConverter`] is the narrow contract the extraction policy relies
//! on. [`PdfiumConverter`] is the production implementation:
//!
//! | Operation          | How                                                  |
//! |--------------------|------------------------------------------------------|
//! | `convert`          | pdfium text for PDFs, UTF-8 for text, [`office`] for html/docx/xlsx |
//! | `probe_has_text`   | any page with embedded text (fails open)             |
//! | `ocr_page_range`   | render → PNG → vision model, first `max_pages` pages  |
//! | `ocr_image`        | decode → PNG → vision model                          |
//!
//! Other extensions, `.pptx` and legacy `.doc` included, are reported as
//! [`IngestError::UnsupportedFormat`].

use crate::config::IngestConfig;
use crate::error::{IngestError, PageError};
use crate::model::resolve_provider;
use crate::output::{FileKind, OcrPages};
use crate::pipeline::{encode, ocr, office, render};
use edgequake_llm::LLMProvider;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text extraction backend used by the ingestion pipeline.
pub trait DocumentConverter: Send + Sync {
    /// Direct text extraction.
    fn convert<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, IngestError>>;

    /// Whether the document carries extractable text. Best effort: answers
    /// `true` when unsure.
    fn probe_has_text<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    /// OCR of at most the first `max_pages` pages.
    fn ocr_page_range<'a>(
        &'a self,
        path: &'a Path,
        max_pages: usize,
    ) -> BoxFuture<'a, Result<OcrPages, IngestError>>;

    /// OCR of a single image file.
    fn ocr_image<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, IngestError>>;

    /// Whether `probe_has_text` is meaningful for `kind`.
    fn supports_text_probe(&self, kind: FileKind) -> bool {
        kind == FileKind::Pdf
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn unreadable(path: &Path, reason: impl ToString) -> IngestError {
    IngestError::UnreadableInput {
        name: display_name(path),
        reason: reason.to_string(),
    }
}

/// pdfium for PDFs, a vision model for OCR.
///
/// The vision provider is resolved on first OCR, so documents with embedded
/// text never need one configured.
pub struct PdfiumConverter {
    config: IngestConfig,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl PdfiumConverter {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            provider: OnceCell::new(),
        }
    }

    fn vision_provider(&self) -> Result<Arc<dyn LLMProvider>, IngestError> {
        self.provider
            .get_or_try_init(|| resolve_provider(&self.config))
            .map(Arc::clone)
    }

    async fn read_text_file(&self, path: &Path) -> Result<String, IngestError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| unreadable(path, e))?;
        let text =
            String::from_utf8(bytes).map_err(|_| unreadable(path, "text file is not valid UTF-8"))?;

        match extension(path).as_str() {
            "html" | "htm" => office::html_to_text(&text)
                .map_err(|e| unreadable(path, format!("HTML conversion failed: {e}"))),
            _ => Ok(text),
        }
    }

    async fn read_office_file(&self, path: &Path) -> Result<String, IngestError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| unreadable(path, e))?;
        let ext = extension(path);
        let kind = ext.clone();
        let text = tokio::task::spawn_blocking(move || match kind.as_str() {
            "docx" => office::docx_to_text(&bytes).map_err(|e| e.to_string()),
            "xlsx" => office::xlsx_to_text(&bytes).map_err(|e| e.to_string()),
            other => Err(format!("no reader for .{other}")),
        })
        .await
        .map_err(|e| IngestError::Internal(format!("Office conversion task panicked: {e}")))?
        .map_err(|reason| unreadable(path, format!("{ext} conversion failed: {reason}")))?;
        debug!("{} conversion produced {} chars", ext, text.len());
        Ok(text)
    }

    async fn ocr_pages(&self, path: &Path, max_pages: usize) -> Result<OcrPages, IngestError> {
        let name = display_name(path);
        let rendered =
            render::render_pages(path, max_pages, self.config.max_rendered_pixels).await?;
        let total_pages = rendered.total_pages;
        let selected = rendered.pages.len();
        if selected == 0 {
            return Ok(OcrPages {
                pages: Vec::new(),
                total_pages,
            });
        }

        let provider = self.vision_provider()?;
        let config = &self.config;
        let progress = config.progress_callback.clone();

        let mut results: Vec<(usize, Result<String, PageError>)> =
            stream::iter(rendered.pages.into_iter().map(|(page_num, image)| {
                let provider = Arc::clone(&provider);
                let progress = progress.clone();
                async move {
                    let result = match image {
                        Ok(img) => match encode::encode_page(&img) {
                            Ok(data) => ocr::transcribe_page(&provider, page_num, data, config).await,
                            Err(e) => Err(PageError::RenderFailed {
                                page: page_num,
                                detail: format!("Image encoding failed: {e}"),
                            }),
                        },
                        Err(e) => Err(e),
                    };
                    if let Some(ref cb) = progress {
                        cb.on_ocr_page(page_num, selected);
                    }
                    (page_num, result)
                }
            }))
            .buffer_unordered(config.ocr_concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|(page_num, _)| *page_num);

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed == selected {
            let first = results
                .iter()
                .find_map(|(_, r)| r.as_ref().err())
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(IngestError::ExtractionFailed {
                name,
                detail: format!("all {selected} OCR pages failed; first error: {first}"),
            });
        }

        let pages = results
            .into_iter()
            .map(|(_, r)| match r {
                Ok(text) => text,
                Err(e) => {
                    warn!("Dropping page from OCR text: {e}");
                    String::new()
                }
            })
            .collect();
        info!(
            "OCR complete: {}/{} pages transcribed ({} in document)",
            selected - failed,
            selected,
            total_pages
        );
        Ok(OcrPages { pages, total_pages })
    }
}

impl DocumentConverter for PdfiumConverter {
    fn convert<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, IngestError>> {
        Box::pin(async move {
            match FileKind::from_path(path) {
                FileKind::Pdf => render::extract_text(path).await,
                FileKind::Text => self.read_text_file(path).await,
                FileKind::Office => self.read_office_file(path).await,
                FileKind::Image | FileKind::Other => Err(IngestError::UnsupportedFormat {
                    name: display_name(path),
                    extension: extension(path),
                }),
            }
        })
    }

    fn probe_has_text<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(render::probe_text(path))
    }

    fn ocr_page_range<'a>(
        &'a self,
        path: &'a Path,
        max_pages: usize,
    ) -> BoxFuture<'a, Result<OcrPages, IngestError>> {
        Box::pin(self.ocr_pages(path, max_pages))
    }

    fn ocr_image<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, IngestError>> {
        Box::pin(async move {
            let owned = path.to_path_buf();
            let max_pixels = self.config.max_rendered_pixels;
            let data = tokio::task::spawn_blocking(move || {
                encode::encode_image_file(&owned, max_pixels)
            })
            .await
            .map_err(|e| IngestError::Internal(format!("Image encode task panicked: {e}")))??;

            let provider = self.vision_provider()?;
            let text = ocr::transcribe_page(&provider, 1, data, &self.config)
                .await
                .map_err(|e| IngestError::ExtractionFailed {
                    name: display_name(path),
                    detail: e.to_string(),
                })?;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_ocr_page(1, 1);
            }
            debug!("Image OCR produced {} chars", text.len());
            Ok(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use docx_rs::{Docx, Paragraph, Run};
    use std::io::Cursor;

    #[tokio::test]
    async fn plain_text_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        std::fs::write(&path, "Hello memo").unwrap();
        let converter = PdfiumConverter::new(IngestConfig::default());
        assert_eq!(converter.convert(&path).await.unwrap(), "Hello memo");
    }

    #[tokio::test]
    async fn invalid_utf8_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let converter = PdfiumConverter::new(IngestConfig::default());
        assert!(matches!(
            converter.convert(&path).await,
            Err(IngestError::UnreadableInput { .. })
        ));
    }

    #[tokio::test]
    async fn html_file_decoded_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notice.html");
        std::fs::write(&path, "<h1>Boil&nbsp;water</h1><p>Caf&eacute; closed</p>").unwrap();
        let converter = PdfiumConverter::new(IngestConfig::default());
        let text = converter.convert(&path).await.unwrap();
        assert!(text.contains("Café closed"));
        assert!(!text.contains("&eacute;"));
    }

    #[tokio::test]
    async fn docx_file_converted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minutes.docx");
        let mut buf = Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Valve leak reported")))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Crew dispatched")))
            .build()
            .pack(&mut buf)
            .unwrap();
        std::fs::write(&path, buf.into_inner()).unwrap();

        let converter = PdfiumConverter::new(IngestConfig::default());
        assert_eq!(
            converter.convert(&path).await.unwrap(),
            "Valve leak reported\nCrew dispatched"
        );
    }

    #[tokio::test]
    async fn corrupt_xlsx_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.xlsx");
        std::fs::write(&path, b"definitely not a workbook").unwrap();
        let converter = PdfiumConverter::new(IngestConfig::default());
        let err = converter.convert(&path).await.unwrap_err();
        assert!(
            matches!(err, IngestError::UnreadableInput { ref reason, .. } if reason.starts_with("xlsx"))
        );
    }

    #[tokio::test]
    async fn pptx_and_doc_unsupported() {
        let converter = PdfiumConverter::new(IngestConfig::default());
        for name in ["deck.pptx", "legacy.doc"] {
            let err = converter.convert(Path::new(name)).await.unwrap_err();
            assert!(matches!(err, IngestError::UnsupportedFormat { .. }), "{name}");
        }
    }

    #[test]
    fn probe_supported_only_for_pdf() {
        let converter = PdfiumConverter::new(IngestConfig::default());
        assert!(converter.supports_text_probe(FileKind::Pdf));
        assert!(!converter.supports_text_probe(FileKind::Text));
    }
}
