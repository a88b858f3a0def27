//! Extraction pipeline: upload → text.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ converter ──┬─▶ render (pdfium text)
//! (stage)   (policy +   (trait)     ├─▶ office (html / docx / xlsx)
//!            timeout)               └─▶ render ─▶ encode ─▶ ocr (vision model)
//! ```
//!
//! 1. [`input`]:     validate the upload and give it a local path
//! 2. [`extract`]:   pick direct text or OCR, bounded by the extraction timeout
//! 3. [`converter`]: the [`converter::DocumentConverter`] contract and its pdfium default
//! 4. [`office`]:    HTML, DOCX and XLSX to text
//! 5. [`render`]:    pdfium calls, all inside `spawn_blocking`
//! 6. [`encode`]:    image → base64 PNG for the vision request
//! 7. [`ocr`]:       one vision call per page, bounded by a timeout
//! 8. [`postprocess`]: deterministic markdown cleanup

pub mod converter;
pub mod encode;
pub mod extract;
pub mod input;
pub mod ocr;
pub mod office;
pub mod postprocess;
pub mod render;
