//! Storage paths, share links, and content types derived from file names.
//!
//! Every uploaded object lives under its gallery's prefix:
//!
//! - `galleries/{gallery_id}/{file_name}` (object path)
//! - `{base_url}/gallery/{gallery_id}` (link the client receives)
//!
//! File names come from the studio owner's disk, so they are reduced to a
//! single safe path segment before they are used in a storage path:
//! - `../../etc/passwd` → `passwd`
//! - `C:\shoot\IMG_0001.JPG` → `IMG_0001.JPG`
//! - `..` → `file`
//!
//! Two files with the same segment would share one object path, so a session
//! renames later ones with a numeric suffix (`IMG_0001.jpg`, `IMG_0001-2.jpg`).
//! Segments are compared case-insensitively.

use std::collections::HashSet;

/// Top-level prefix of every gallery's objects.
pub const GALLERY_PREFIX: &str = "galleries";

/// Reduce a client-supplied file name to one path segment.
///
/// Keeps the last `/`- or `\`-separated component, strips control characters
/// and leading dots, and falls back to `file` when nothing usable remains.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Object path for a file inside a gallery.
pub fn storage_path(gallery_id: &str, file_name: &str) -> String {
    format!(
        "{GALLERY_PREFIX}/{gallery_id}/{}",
        sanitize_file_name(file_name)
    )
}

/// `name` if its storage segment is still free, otherwise the first free
/// `{stem}-{n}.{ext}` with `n` from 2. The chosen segment is added to `taken`.
pub fn unique_file_name(name: &str, taken: &mut HashSet<String>) -> String {
    let segment = sanitize_file_name(name);
    if taken.insert(segment.to_lowercase()) {
        return name.to_string();
    }
    let (stem, ext) = match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (segment.as_str(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}{ext}");
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Shareable link to a gallery's client page.
pub fn gallery_link(base_url: &str, gallery_id: &str) -> String {
    format!("{}/gallery/{gallery_id}", base_url.trim_end_matches('/'))
}

/// Content type implied by a file's extension (case-insensitive).
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(content_type)
}

/// Whether the intake accepts payloads of this content type.
pub fn is_supported_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}
