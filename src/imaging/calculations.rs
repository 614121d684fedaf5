//! Pure calculation functions for image dimensions and size accounting.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the downscaled dimensions for an image whose longer edge exceeds
/// `max_dimension`.
///
/// The longer edge becomes exactly `max_dimension`; the shorter edge is scaled
/// by the same factor and rounded. Returns `None` when the image already fits,
/// meaning no resize is needed. A square image is treated as portrait, so the
/// height is the edge that gets clamped.
///
/// # Examples
/// ```
/// # use studio_gallery::imaging::calculate_bounded_dimensions;
/// assert_eq!(calculate_bounded_dimensions((4000, 3000), 2000), Some((2000, 1500)));
/// assert_eq!(calculate_bounded_dimensions((1200, 800), 2000), None);
/// ```
pub fn calculate_bounded_dimensions(original: (u32, u32), max_dimension: u32) -> Option<(u32, u32)> {
    let (width, height) = original;
    if width <= max_dimension && height <= max_dimension {
        return None;
    }

    if width > height {
        let scaled = (height as f64 * (max_dimension as f64 / width as f64)).round() as u32;
        Some((max_dimension, scaled.max(1)))
    } else {
        let scaled = (width as f64 * (max_dimension as f64 / height as f64)).round() as u32;
        Some((scaled.max(1), max_dimension))
    }
}

/// Original size divided by compressed size, rounded to two decimals.
///
/// Returns `0.0` for an empty compressed payload rather than dividing by zero.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        return 0.0;
    }
    (original as f64 / compressed as f64 * 100.0).round() / 100.0
}
