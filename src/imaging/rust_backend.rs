//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Animation check | `PngDecoder::is_apng`, `WebPDecoder::has_animation` (header only) |
//! | Decode (JPEG, PNG, WebP) | `image::load_from_memory` |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the requested quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, best compression (lossless, quality unused) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless, quality unused) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeFormat, RecompressParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngDecoder, PngEncoder};
use image::codecs::webp::{WebPDecoder, WebPEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(data: &[u8]) -> Result<DynamicImage, BackendError> {
    image::load_from_memory(data)
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode image: {e}")))
}

/// Encode into a fresh buffer in the given format.
fn encode(img: &DynamicImage, format: EncodeFormat, quality: u8) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        // JPEG has no alpha channel.
        EncodeFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality)),
        EncodeFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut buf,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
        EncodeFormat::WebP => {
            let normalized = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            normalized.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        }
    };
    result.map_err(|e| {
        BackendError::ProcessingFailed(format!("{} encode failed: {e}", format.content_type()))
    })?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, data: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to read dimensions: {e}"))
            })?;
        Ok(Dimensions { width, height })
    }

    fn recompress(&self, params: &RecompressParams<'_>) -> Result<Vec<u8>, BackendError> {
        let img = decode(params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        encode(&resized, params.format, params.quality.value() as u8)
    }

    /// Unreadable headers count as still; recompress reports those failures.
    fn is_animated(&self, data: &[u8], format: EncodeFormat) -> bool {
        match format {
            EncodeFormat::Jpeg => false,
            EncodeFormat::Png => PngDecoder::new(Cursor::new(data))
                .and_then(|decoder| decoder.is_apng())
                .unwrap_or(false),
            EncodeFormat::WebP => WebPDecoder::new(Cursor::new(data))
                .map(|decoder| decoder.has_animation())
                .unwrap_or(false),
        }
    }
}
