//! Image encoding for the vision model: pixels → base64 PNG [`ImageData`].
//!
//! Rendered PDF pages and uploaded image files both go through PNG so the
//! vision request always carries one lossless format, whatever the upload
//! was (TIFF scans, WebP screenshots, …). `detail: "high"` keeps small print
//! legible to the model.

use crate::error::IngestError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode a decoded image as a base64 PNG attachment.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Decode an image file from disk, shrink it to fit `max_pixels` on its
/// longest edge, and encode it for the vision model.
///
/// Blocking; call from `spawn_blocking`.
pub fn encode_image_file(path: &Path, max_pixels: u32) -> Result<ImageData, IngestError> {
    let img = image::open(path).map_err(|e| IngestError::CorruptDocument {
        path: path.to_path_buf(),
        detail: format!("image decode failed: {e}"),
    })?;

    let img = if img.width().max(img.height()) > max_pixels {
        img.resize(max_pixels, max_pixels, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    encode_page(&img).map_err(|e| IngestError::Internal(format!("PNG encoding failed: {e}")))
}
