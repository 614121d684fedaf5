//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides whether and how far to shrink an image) and the
//! [`backend`](super::backend) (which does the pixel work). Swapping in a mock
//! backend for tests needs no change to the operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 70). Clamped on construction.
//! - [`EncodeFormat`]: Output codec, always the same family as the input.
//! - [`RecompressParams`]: Source bytes, target dimensions, format and quality.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Raster formats the compressor re-encodes.
///
/// GIF is intentionally absent: re-encoding would drop animation frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Jpeg,
    Png,
    WebP,
}

impl EncodeFormat {
    /// Map a MIME type to a re-encodable format.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

/// Parameters for a downscale + re-encode of an in-memory image.
#[derive(Debug, Clone, PartialEq)]
pub struct RecompressParams<'a> {
    pub source: &'a [u8],
    pub format: EncodeFormat,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}
