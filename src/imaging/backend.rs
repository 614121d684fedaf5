//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the operations the compressor needs:
//! identify (read dimensions without a full decode), recompress (decode,
//! resize, re-encode), and an animation check that keeps multi-frame files
//! away from recompress, which only sees the first frame. All of them work
//! on in-memory payloads; uploads never touch a temporary file.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image` crate.

use super::params::{EncodeFormat, RecompressParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Send + Sync` so one backend can serve rayon's parallel compression and be
/// moved into `spawn_blocking`.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions from the encoded payload.
    fn identify(&self, data: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode, resize to exactly the requested dimensions, and re-encode.
    fn recompress(&self, params: &RecompressParams<'_>) -> Result<Vec<u8>, BackendError>;

    /// Whether the payload holds more than a still image (animated WebP, APNG).
    fn is_animated(&self, data: &[u8], format: EncodeFormat) -> bool;
}
