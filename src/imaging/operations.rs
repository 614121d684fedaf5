//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_bounded_dimensions;
use super::params::{EncodeFormat, Quality, RecompressParams};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &(impl ImageBackend + ?Sized), data: &[u8]) -> Result<(u32, u32)> {
    let dims = backend.identify(data)?;
    Ok((dims.width, dims.height))
}

/// Configuration for bounded re-encoding.
#[derive(Debug, Clone, Copy)]
pub struct DownscaleConfig {
    /// Longest allowed edge in pixels.
    pub max_dimension: u32,
    pub quality: Quality,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            quality: Quality::default(),
        }
    }
}

/// Plan a downscale without executing it.
///
/// Returns `None` when the image already fits inside `max_dimension`.
pub fn plan_downscale<'a>(
    source: &'a [u8],
    original_dims: (u32, u32),
    format: EncodeFormat,
    config: &DownscaleConfig,
) -> Option<RecompressParams<'a>> {
    let (width, height) = calculate_bounded_dimensions(original_dims, config.max_dimension)?;
    Some(RecompressParams {
        source,
        format,
        width,
        height,
        quality: config.quality,
    })
}

/// Outcome of [`downscale`].
#[derive(Debug, Clone, PartialEq)]
pub enum Downscaled {
    /// Longer edge already within bounds; nothing was encoded.
    WithinBounds { width: u32, height: u32 },
    /// Re-encoded at the bounded dimensions.
    Encoded {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
}

/// Identify the image, then resize and re-encode it if it is oversized.
pub fn downscale(
    backend: &(impl ImageBackend + ?Sized),
    source: &[u8],
    format: EncodeFormat,
    config: &DownscaleConfig,
) -> Result<Downscaled> {
    let dims = get_dimensions(backend, source)?;
    match plan_downscale(source, dims, format, config) {
        None => Ok(Downscaled::WithinBounds {
            width: dims.0,
            height: dims.1,
        }),
        Some(params) => {
            let data = backend.recompress(&params)?;
            Ok(Downscaled::Encoded {
                data,
                width: params.width,
                height: params.height,
            })
        }
    }
}
