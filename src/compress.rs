//! Pre-upload image compression.
//!
//! Each selected file is shrunk in memory before it is uploaded:
//!
//! | Input | Result |
//! |---|---|
//! | Not `image/*`, or `image/gif` | Passed through untouched, never decoded |
//! | Animated WebP or APNG | Passed through untouched (header read only) |
//! | Longer edge ≤ `max_dimension` | Passed through untouched (header read only) |
//! | Longer edge > `max_dimension` | Downscaled (Lanczos3) and re-encoded in the same format |
//!
//! A re-encoded payload replaces the original only when it is strictly
//! smaller. Decode and encode failures are not errors: the original bytes are
//! uploaded instead and a `debug` line records why.
//!
//! Successful shrinks emit an `image_compressed` telemetry event carrying the
//! original size, the compressed size, and their ratio.
//!
//! ## Parallel Processing
//!
//! [`Compressor::compress_items`] spreads a session's items over the rayon
//! pool. Async callers run it inside `tokio::task::spawn_blocking`.

use std::sync::Arc;

use bytes::Bytes;
use rayon::prelude::*;

use crate::imaging::{
    DownscaleConfig, Downscaled, EncodeFormat, ImageBackend, Quality, RustBackend,
    compression_ratio, downscale,
};
use crate::telemetry::{SharedTelemetry, TelemetryEvent};
use crate::types::UploadItem;

/// Why the original payload was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeptReason {
    /// Animated or non-image content type.
    PassThrough,
    /// Already within the dimension bound.
    WithinBounds,
    /// Re-encoding did not make the payload smaller.
    NotSmaller,
    /// Decode or encode failed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    Compressed { original: u64, compressed: u64 },
    Kept(KeptReason),
}

pub struct Compressor {
    backend: Arc<dyn ImageBackend>,
    config: DownscaleConfig,
    telemetry: SharedTelemetry,
}

impl Compressor {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        config: DownscaleConfig,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            backend,
            config,
            telemetry,
        }
    }

    /// Compressor on the pure-Rust backend with the configured bound and quality.
    pub fn from_config(
        config: &crate::config::CompressionConfig,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self::new(
            Arc::new(RustBackend::new()),
            DownscaleConfig {
                max_dimension: config.max_dimension,
                quality: Quality::new(config.quality),
            },
            telemetry,
        )
    }

    /// Compress one payload, returning the bytes to upload and what happened.
    pub fn compress(&self, data: &Bytes, content_type: &str) -> (Bytes, CompressOutcome) {
        let kept = |reason| (data.clone(), CompressOutcome::Kept(reason));

        if !content_type.starts_with("image/") || content_type == "image/gif" {
            return kept(KeptReason::PassThrough);
        }
        let Some(format) = EncodeFormat::from_content_type(content_type) else {
            return kept(KeptReason::PassThrough);
        };
        if self.backend.is_animated(data, format) {
            tracing::debug!(content_type, "Animated image, keeping original");
            return kept(KeptReason::PassThrough);
        }

        let encoded = match downscale(self.backend.as_ref(), data, format, &self.config) {
            Ok(Downscaled::WithinBounds { .. }) => return kept(KeptReason::WithinBounds),
            Ok(Downscaled::Encoded { data, .. }) => data,
            Err(e) => {
                tracing::debug!(content_type, error = %e, "Compression failed, keeping original");
                return kept(KeptReason::Failed);
            }
        };

        let original = data.len() as u64;
        let compressed = encoded.len() as u64;
        if compressed >= original {
            tracing::debug!(original, compressed, "Re-encoded image is not smaller, keeping original");
            return kept(KeptReason::NotSmaller);
        }

        self.telemetry.log_event(
            TelemetryEvent::new("image_compressed")
                .with("original_size", original)
                .with("compressed_size", compressed)
                .with("compression_ratio", compression_ratio(original, compressed)),
        );
        (
            Bytes::from(encoded),
            CompressOutcome::Compressed {
                original,
                compressed,
            },
        )
    }

    /// Compress an item in place and mark its compression settled.
    pub fn compress_item(&self, item: &mut UploadItem) -> CompressOutcome {
        let (data, outcome) = self.compress(&item.data, &item.content_type);
        item.data = data;
        item.compressed_size = Some(item.size());
        item.compressing = false;
        outcome
    }

    /// Compress every item still marked `compressing`, in parallel.
    ///
    /// Outcomes are returned in item order; settled items report
    /// [`KeptReason::PassThrough`].
    pub fn compress_items(&self, items: &mut [UploadItem]) -> Vec<CompressOutcome> {
        items
            .par_iter_mut()
            .map(|item| {
                if item.compressing {
                    self.compress_item(item)
                } else {
                    CompressOutcome::Kept(KeptReason::PassThrough)
                }
            })
            .collect()
    }
}
