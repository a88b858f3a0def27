//! pdfium access: binding, page count, embedded text, rasterisation.
//!
//! pdfium is a C++ library with thread-local state; every entry point here
//! does its work inside `tokio::task::spawn_blocking` so Tokio workers never
//! stall on it. Each call binds, opens, reads and drops the document on the
//! same blocking thread.
//!
//! Rasterisation caps the longest edge at `max_pixels` instead of picking a
//! DPI: scans come in every physical size and the vision model only needs
//! about 2000 px to read body text.

use crate::error::{IngestError, PageError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Bind to pdfium: `PDFIUM_LIB_PATH` when set, otherwise the system library.
pub fn bind_pdfium() -> Result<Pdfium, IngestError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => Pdfium::bind_to_library(&p)
            .map_err(|e| IngestError::PdfiumBindingFailed(format!("{p}: {e}")))?,
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| IngestError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

fn open_error(path: &Path, e: PdfiumError) -> IngestError {
    IngestError::CorruptDocument {
        path: path.to_path_buf(),
        detail: format!("{e:?}"),
    }
}

async fn run_blocking<T, F>(what: &'static str, f: F) -> Result<T, IngestError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, IngestError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::Internal(format!("{what} task panicked: {e}")))?
}

/// Embedded text of every page, pages separated by a blank line.
pub async fn extract_text(pdf_path: &Path) -> Result<String, IngestError> {
    let path = pdf_path.to_path_buf();
    run_blocking("text extraction", move || extract_text_blocking(&path)).await
}

fn extract_text_blocking(path: &Path) -> Result<String, IngestError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| open_error(path, e))?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| IngestError::CorruptDocument {
            path: path.to_path_buf(),
            detail: format!("page {}: {e:?}", idx + 1),
        })?;
        pages.push(text.all().trim().to_string());
    }
    info!("Extracted embedded text from {} pages", pages.len());
    Ok(pages.join("\n\n"))
}

/// Whether any page carries embedded text.
///
/// Best effort: when the document cannot be inspected the answer is `true`,
/// so the caller tries the cheaper direct path first.
pub async fn probe_text(pdf_path: &Path) -> bool {
    let path = pdf_path.to_path_buf();
    let probe = run_blocking("text probe", move || {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(&path, None)
            .map_err(|e| open_error(&path, e))?;
        let found = document
            .pages()
            .iter()
            .any(|page| page.text().is_ok_and(|t| !t.all().trim().is_empty()));
        Ok(found)
    })
    .await;

    match probe {
        Ok(found) => found,
        Err(e) => {
            debug!("Text probe inconclusive ({e}); assuming text present");
            true
        }
    }
}

/// Pages rasterised for OCR.
pub struct RenderedPages {
    /// `(page_num_1based, image or render failure)`, in page order.
    pub pages: Vec<(usize, Result<DynamicImage, PageError>)>,
    /// Page count of the whole document.
    pub total_pages: usize,
}

/// Rasterise the first `max_pages` pages.
///
/// A page that fails to render is reported in place; only failing to open
/// the document is fatal.
pub async fn render_pages(
    pdf_path: &Path,
    max_pages: usize,
    max_pixels: u32,
) -> Result<RenderedPages, IngestError> {
    let path = pdf_path.to_path_buf();
    run_blocking("render", move || {
        render_pages_blocking(&path, max_pages, max_pixels)
    })
    .await
}

fn render_pages_blocking(
    path: &Path,
    max_pages: usize,
    max_pixels: u32,
) -> Result<RenderedPages, IngestError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| open_error(path, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let selected = total_pages.min(max_pages);
    info!("PDF loaded: {} pages, rendering {}", total_pages, selected);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut out = Vec::with_capacity(selected);
    for idx in 0..selected {
        let page_num = idx + 1;
        let rendered =
            render_one(pages, idx, &render_config).map_err(|e| PageError::RenderFailed {
                page: page_num,
                detail: format!("{e:?}"),
            });

        match &rendered {
            Ok(img) => debug!("Rendered page {} → {}x{} px", page_num, img.width(), img.height()),
            Err(e) => warn!("{e}"),
        }
        out.push((page_num, rendered));
    }

    Ok(RenderedPages {
        pages: out,
        total_pages,
    })
}

fn render_one(
    pages: &PdfPages<'_>,
    idx: usize,
    config: &PdfRenderConfig,
) -> Result<DynamicImage, PdfiumError> {
    let page = pages.get(idx as u16)?;
    let bitmap = page.render_with_config(config)?;
    Ok(bitmap.as_image())
}
