//! CLI output formatting for every command.
//!
//! # Entity Display Contract
//!
//! Galleries and images follow the same two-level pattern everywhere:
//!
//! 1. **Header line**: positional index + name (+ photo count for galleries)
//! 2. **Context lines**: indented `Client:`, `Link:`, sizes, errors
//!
//! # Output Format
//!
//! ## Create
//!
//! ```text
//! Selected 3 files (21.4 MB, 43% of limit)
//! Rejected
//!     huge.jpg: 12.0 MB exceeds the 10.0 MB per-file limit
//!
//! Compressed
//! 001 dawn.jpg
//!     9.1 MB → 1.4 MB (85% smaller)
//! 002 dusk.png
//!     2.0 MB (unchanged)
//!
//! Batch 1/1 (2 files)
//!     uploaded galleries/5d0c…/dawn.jpg
//!     uploaded galleries/5d0c…/dusk.png
//!     2/2 complete
//!
//! Uploaded 2 images in 1 batch (3.4 MB)
//!     Link: http://localhost:8080/gallery/5d0c…
//! ```
//!
//! ## List
//!
//! ```text
//! 001 Smith Wedding (12 photos)
//!     Client: Jane Smith <jane@example.com>
//!     Created: 2024-06-01 10:00 UTC
//!     Id: 5d0c…
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability; [`print_lines`] writes them to stdout. Format functions are
//! pure: no I/O, no side effects.

use crate::gallery::{ClientEmail, DeleteReport};
use crate::intake::{Rejection, format_mib};
use crate::types::{GallerySummary, UploadItem};
use crate::upload::{UploadEvent, UploadReport};
use crate::viewer::GalleryView;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Write formatted lines to stdout.
pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Create: selection, compression, upload
// ============================================================================

/// Summary of what was admitted and what was turned away.
pub fn format_admission(accepted: usize, total_size: u64, limit_usage: f64, rejected: &[Rejection]) -> Vec<String> {
    let mut lines = vec![format!(
        "Selected {} ({}, {:.0}% of limit)",
        plural(accepted, "file", "files"),
        format_mib(total_size),
        limit_usage * 100.0
    )];
    if !rejected.is_empty() {
        lines.push("Rejected".to_string());
        for rejection in rejected {
            lines.push(format!("{}{}", indent(1), rejection));
        }
    }
    lines
}

/// Per-item compression result.
pub fn format_compression(items: &[UploadItem]) -> Vec<String> {
    let mut lines = vec!["Compressed".to_string()];
    for (i, item) in items.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), item.file_name));
        let detail = match item.saved_percent() {
            Some(saved) => format!(
                "{} → {} ({}% smaller)",
                format_mib(item.original_size),
                format_mib(item.size()),
                saved
            ),
            None => format!("{} (unchanged)", format_mib(item.size())),
        };
        lines.push(format!("{}{}", indent(1), detail));
    }
    lines
}

/// Live progress line(s) for one upload event.
///
/// Byte-level progress is not printed; the item and batch events carry
/// enough for a terminal.
pub fn format_upload_event(event: &UploadEvent) -> Vec<String> {
    match event {
        UploadEvent::BatchStarted { batch, batches, size } => {
            vec![format!("Batch {batch}/{batches} ({})", plural(*size, "file", "files"))]
        }
        UploadEvent::Progress { .. } => Vec::new(),
        UploadEvent::ItemUploaded { path, .. } => vec![format!("{}uploaded {path}", indent(1))],
        UploadEvent::ItemFailed { file_name, error, .. } => {
            vec![format!("{}failed {file_name}: {error}", indent(1))]
        }
        UploadEvent::MetadataFailed { file_name, error, .. } => {
            vec![format!("{}not recorded {file_name}: {error}", indent(1))]
        }
        UploadEvent::BatchSettled { completed, total, .. } => {
            vec![format!("{}{completed}/{total} complete", indent(1))]
        }
    }
}

/// Final session summary with the share link.
pub fn format_upload_report(report: &UploadReport, link: &str) -> Vec<String> {
    let mut lines = vec![format!(
        "Uploaded {} in {} ({})",
        plural(report.uploaded, "image", "images"),
        plural(report.batches, "batch", "batches"),
        format_mib(report.total_bytes)
    )];
    if report.skipped > 0 {
        lines.push(format!("{}Already uploaded: {}", indent(1), report.skipped));
    }
    for failure in &report.failed {
        lines.push(format!("{}Failed: {} ({})", indent(1), failure.file_name, failure.error));
    }
    if !report.metadata_failures.is_empty() {
        lines.push(format!(
            "{}{} uploaded but not recorded; run again to retry",
            indent(1),
            plural(report.metadata_failures.len(), "image was", "images were")
        ));
    }
    lines.push(format!("{}Link: {link}", indent(1)));
    lines
}

// ============================================================================
// Admin: list, delete, email
// ============================================================================

pub fn format_gallery_list(galleries: &[GallerySummary]) -> Vec<String> {
    if galleries.is_empty() {
        return vec!["No galleries found".to_string()];
    }
    let mut lines = Vec::new();
    for (i, gallery) in galleries.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            gallery.name,
            plural(gallery.image_count, "photo", "photos")
        ));
        lines.push(format!(
            "{}Client: {} <{}>",
            indent(1),
            gallery.client_name,
            gallery.client_email
        ));
        lines.push(format!(
            "{}Created: {}",
            indent(1),
            gallery.created_at.format("%Y-%m-%d %H:%M UTC")
        ));
        lines.push(format!("{}Id: {}", indent(1), gallery.gallery_id));
    }
    lines
}

pub fn format_delete(gallery_id: &str, report: &DeleteReport) -> Vec<String> {
    let mut lines = vec![format!("Deleted gallery {gallery_id}")];
    if report.objects_deleted > 0 {
        lines.push(format!(
            "{}Removed {}",
            indent(1),
            plural(report.objects_deleted, "image", "images")
        ));
    }
    for path in &report.objects_failed {
        lines.push(format!("{}Could not remove {path}", indent(1)));
    }
    lines
}

pub fn format_email(email: &ClientEmail) -> Vec<String> {
    let mut lines = vec![
        format!("To: {}", email.to),
        format!("Subject: {}", email.subject),
        String::new(),
    ];
    lines.extend(email.body.lines().map(str::to_string));
    lines.push(String::new());
    lines.push(email.mailto.clone());
    lines
}

// ============================================================================
// View
// ============================================================================

pub fn format_view(view: &GalleryView) -> Vec<String> {
    match view {
        GalleryView::NotFound => vec!["Gallery not found".to_string()],
        GalleryView::Unavailable(reason) => vec![format!("Gallery unavailable: {reason}")],
        GalleryView::Empty(gallery) => vec![
            format!("{} (0 photos)", gallery.name),
            format!("{}No images yet", indent(1)),
        ],
        GalleryView::Ready { gallery, images } => {
            let mut lines = vec![format!(
                "{} ({})",
                gallery.name,
                plural(images.len(), "photo", "photos")
            )];
            for (i, image) in images.iter().enumerate() {
                lines.push(format!(
                    "{}{} {} [{}]",
                    indent(1),
                    format_index(i + 1),
                    image.name,
                    image.loading.as_attr()
                ));
                lines.push(format!("{}{}", indent(2), image.url));
            }
            lines
        }
    }
}
