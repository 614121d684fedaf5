//! Shared types for the intake pipeline and the gallery documents.
//!
//! [`UploadItem`] lives only inside an [`UploadSession`](crate::upload::UploadSession).
//! [`GalleryRecord`] and [`ImageMetadata`] are what the document store persists;
//! they serialize with camelCase keys so records written by older tooling
//! (`galleryId`, `clientName`, `createdAt`, ...) remain readable.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One file travelling through admission → compression → upload.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    /// Current payload. Replaced in place when compression produces a smaller one.
    pub data: Bytes,
    /// Where the payload came from (a filesystem path or a `memory:` reference).
    pub preview: String,
    /// Upload progress, 0–100.
    pub progress: f64,
    pub compressing: bool,
    /// The object exists in the object store.
    pub uploaded: bool,
    /// The image metadata has been appended to the gallery record.
    pub recorded: bool,
    pub error: Option<String>,
    /// Storage path, assigned when the upload starts.
    pub path: Option<String>,
    pub original_size: u64,
    pub compressed_size: Option<u64>,
}

impl UploadItem {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
        preview: impl Into<String>,
    ) -> Self {
        let data = data.into();
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            original_size: data.len() as u64,
            data,
            preview: preview.into(),
            progress: 0.0,
            compressing: true,
            uploaded: false,
            recorded: false,
            error: None,
            path: None,
            compressed_size: None,
        }
    }

    /// Size of the current payload in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Percentage saved by compression, when compression made the file smaller.
    pub fn saved_percent(&self) -> Option<u32> {
        let compressed = self.compressed_size?;
        if self.original_size == 0 || compressed >= self.original_size {
            return None;
        }
        let kept = compressed as f64 / self.original_size as f64 * 100.0;
        Some((100.0 - kept).round() as u32)
    }

    /// Uploaded and recorded: nothing left to do for this item.
    pub fn is_done(&self) -> bool {
        self.uploaded && self.recorded
    }
}

/// Polled view of one item, for callers that prefer snapshots over events.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStatus {
    pub id: Uuid,
    pub file_name: String,
    pub progress: f64,
    pub compressing: bool,
    pub uploaded: bool,
    pub recorded: bool,
    pub error: Option<String>,
}

impl From<&UploadItem> for ItemStatus {
    fn from(item: &UploadItem) -> Self {
        Self {
            id: item.id,
            file_name: item.file_name.clone(),
            progress: item.progress,
            compressing: item.compressing,
            uploaded: item.uploaded,
            recorded: item.recorded,
            error: item.error.clone(),
        }
    }
}

/// A client gallery as persisted in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryRecord {
    pub gallery_id: String,
    pub name: String,
    pub client_name: String,
    #[serde(default)]
    pub client_email: String,
    pub created_at: DateTime<Utc>,
    /// Append-only during an upload session.
    #[serde(default)]
    pub images: Vec<ImageMetadata>,
}

/// One entry of a gallery's image list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    /// Same identifier as the originating [`UploadItem`].
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Admin listing row: a record without its image list.
#[derive(Debug, Clone, PartialEq)]
pub struct GallerySummary {
    pub gallery_id: String,
    pub name: String,
    pub client_name: String,
    pub client_email: String,
    pub created_at: DateTime<Utc>,
    pub image_count: usize,
}

impl From<&GalleryRecord> for GallerySummary {
    fn from(record: &GalleryRecord) -> Self {
        Self {
            gallery_id: record.gallery_id.clone(),
            name: record.name.clone(),
            client_name: record.client_name.clone(),
            client_email: record.client_email.clone(),
            created_at: record.created_at,
            image_count: record.images.len(),
        }
    }
}
