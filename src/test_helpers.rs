//! Shared test utilities for the studio-gallery test suite.
//!
//! Provides synthetic image payloads (including animated ones), upload-item builders, and a telemetry
//! sink that records events for later assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = synthetic_jpeg(3000, 2000, 95);
//! let item = jpeg_item("dawn.jpg", jpeg);
//!
//! let telemetry = RecordingTelemetry::shared();
//! // ... run the pipeline with telemetry.clone() ...
//! assert_eq!(telemetry.names(), vec!["image_compressed"]);
//! ```

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use image::codecs::webp::WebPEncoder;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use img_parts::png::{Png, PngChunk};

use crate::telemetry::{Telemetry, TelemetryEvent};
use crate::types::UploadItem;

// =========================================================================
// Synthetic images
// =========================================================================

/// Smooth gradient with a little per-pixel texture so encoders have work to do.
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let b = ((x ^ y) & 0x3F) as u8;
        Rgb([r, g, b])
    })
}

/// Encode a gradient as JPEG at the given quality.
pub fn synthetic_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    image::DynamicImage::ImageRgb8(gradient(width, height))
        .write_with_encoder(encoder)
        .unwrap();
    buf
}

/// Encode a gradient as PNG.
pub fn synthetic_png(width: u32, height: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut cursor, ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

/// A gradient PNG carrying an `acTL` chunk, which makes it an APNG.
pub fn apng(width: u32, height: u32) -> Vec<u8> {
    let mut png = Png::from_bytes(Bytes::from(synthetic_png(width, height))).unwrap();
    // num_frames = 1, num_plays = 0 (loop forever); goes right after IHDR.
    let mut actl = 1u32.to_be_bytes().to_vec();
    actl.extend_from_slice(&0u32.to_be_bytes());
    png.chunks_mut().insert(1, PngChunk::new(*b"acTL", Bytes::from(actl)));
    png.encoder().bytes().to_vec()
}

fn le24(value: u32) -> [u8; 3] {
    let [a, b, c, _] = value.to_le_bytes();
    [a, b, c]
}

/// A one-frame animated WebP: a lossless still re-wrapped in `VP8X`/`ANIM`/`ANMF`.
pub fn animated_webp(width: u32, height: u32) -> Vec<u8> {
    let mut still = Vec::new();
    image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255])))
        .write_with_encoder(WebPEncoder::new_lossless(&mut still))
        .unwrap();
    // Skip the RIFF header; what remains is the whole VP8L chunk.
    let frame = &still[12..];

    let mut vp8x = vec![0x10 | 0x02, 0, 0, 0]; // alpha + animation
    vp8x.extend(le24(width - 1));
    vp8x.extend(le24(height - 1));
    let anim = [0u8, 0, 0, 0, 0, 0];
    let mut anmf = Vec::new();
    for field in [0, 0, width - 1, height - 1, 100] {
        anmf.extend(le24(field));
    }
    anmf.push(0);
    anmf.extend_from_slice(frame);

    let mut body = b"WEBP".to_vec();
    for (id, payload) in [(b"VP8X", &vp8x[..]), (b"ANIM", &anim[..]), (b"ANMF", &anmf[..])] {
        body.extend_from_slice(id);
        body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        body.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            body.push(0);
        }
    }
    let mut riff = b"RIFF".to_vec();
    riff.extend_from_slice(&(body.len() as u32).to_le_bytes());
    riff.extend(body);
    riff
}

// =========================================================================
// Item builders
// =========================================================================

pub fn jpeg_item(name: &str, data: Vec<u8>) -> UploadItem {
    UploadItem::new(name, "image/jpeg", data, format!("memory:{name}"))
}

/// `count` small opaque items named `img-00.jpg`, `img-01.jpg`, ...
/// with compression already settled.
pub fn ready_items(count: usize) -> Vec<UploadItem> {
    (0..count)
        .map(|i| {
            let mut item = jpeg_item(&format!("img-{i:02}.jpg"), vec![i as u8; 16 + i]);
            item.compressing = false;
            item
        })
        .collect()
}

// =========================================================================
// Telemetry
// =========================================================================

/// Telemetry sink that keeps every event in order.
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name).collect()
    }

    /// The first event with the given name.
    pub fn find(&self, name: &str) -> Option<TelemetryEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }
}

impl Telemetry for RecordingTelemetry {
    fn log_event(&self, event: TelemetryEvent) {
        self.events.lock().unwrap().push(event);
    }
}
