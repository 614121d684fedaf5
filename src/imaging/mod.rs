//! Image processing in pure Rust, in memory.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Downscale** | Lanczos3 `resize_exact` to a bounded longer edge |
//! | **Re-encode** | JPEG at a quality factor; PNG / WebP lossless |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{calculate_bounded_dimensions, compression_ratio};
pub use operations::{DownscaleConfig, Downscaled, downscale, get_dimensions, plan_downscale};
pub use params::{EncodeFormat, Quality, RecompressParams};
pub use rust_backend::RustBackend;
