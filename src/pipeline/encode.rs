//! Image encoding: `NormalizedImage` → JPEG bytes for embedding.
//!
//! Pixels are embedded at their normalised resolution; the document only
//! states the display size.

use crate::pipeline::normalize::NormalizedImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

/// Encode an invoice raster as a baseline JPEG at `quality` (1–100).
pub fn encode_jpeg(image: &NormalizedImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    image.pixels.write_with_encoder(encoder)?;

    debug!(
        "Encoded {}x{} invoice → {} bytes JPEG (q={})",
        image.width,
        image.height,
        buf.len(),
        quality
    );
    Ok(buf)
}
