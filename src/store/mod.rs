//! Storage seams: an object store for image bytes and a document store for
//! gallery records.
//!
//! Hosted blob and document services are consumed through [`ObjectStore`] and
//! [`DocumentStore`]. Two adapter families ship with the crate:
//!
//! | Adapter | Backing | Used by |
//! |---|---|---|
//! | [`memory::MemoryObjectStore`] / [`memory::MemoryDocumentStore`] | `tokio::sync::Mutex` maps | tests, dry runs |
//! | [`fs::FsObjectStore`] / [`fs::FsDocumentStore`] | files under the data directory | the CLI |
//!
//! Uploads are streams: [`ObjectStore::upload`] returns an [`UploadTask`] that
//! yields [`TransferProgress`] snapshots and ends once the object is committed.
//! An error item ends the transfer; nothing is committed in that case.

pub mod fs;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::types::{GalleryRecord, ImageMetadata};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Bytes committed so far for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Completion as a percentage, 0–100. An empty payload counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 * 100.0 / self.total_bytes as f64
    }
}

/// A running upload. Drive it to completion to commit the object.
pub type UploadTask = BoxStream<'static, StorageResult<TransferProgress>>;

/// Blob storage addressed by slash-separated paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start uploading `data` to `path`, replacing any existing object.
    fn upload(&self, path: &str, data: Bytes, content_type: &str) -> UploadTask;

    /// Time-bounded URL from which the object can be fetched.
    async fn resolve_url(&self, path: &str, ttl: Duration) -> StorageResult<String>;

    async fn exists(&self, path: &str) -> StorageResult<bool>;

    async fn delete(&self, path: &str) -> StorageResult<()>;
}

/// Record fields supported by [`DocumentStore::find_by_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Name,
    ClientName,
    ClientEmail,
}

impl RecordField {
    /// Persisted key of the field.
    pub fn key(self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::ClientName => "clientName",
            RecordField::ClientEmail => "clientEmail",
        }
    }

    pub fn value_of(self, record: &GalleryRecord) -> &str {
        match self {
            RecordField::Name => &record.name,
            RecordField::ClientName => &record.client_name,
            RecordField::ClientEmail => &record.client_email,
        }
    }
}

/// Gallery records keyed by gallery id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write the whole record, replacing any existing one with the same id.
    async fn put(&self, record: &GalleryRecord) -> StorageResult<()>;

    /// Point read. `Ok(None)` when no record has this id.
    async fn get(&self, gallery_id: &str) -> StorageResult<Option<GalleryRecord>>;

    /// Records whose `field` equals `value` exactly.
    async fn find_by_field(
        &self,
        field: RecordField,
        value: &str,
    ) -> StorageResult<Vec<GalleryRecord>>;

    /// Every record, newest first.
    async fn list(&self) -> StorageResult<Vec<GalleryRecord>>;

    /// Append one entry to a record's image list.
    ///
    /// Must be atomic with respect to concurrent appends on the same record:
    /// no append may be lost. Fails with [`StorageError::NotFound`] when the
    /// record does not exist.
    async fn append_image(&self, gallery_id: &str, image: &ImageMetadata) -> StorageResult<()>;

    async fn delete(&self, gallery_id: &str) -> StorageResult<()>;
}

/// Sort records newest first, breaking ties by id for a stable listing.
pub(crate) fn sort_newest_first(records: &mut [GalleryRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.gallery_id.cmp(&b.gallery_id))
    });
}

/// Reject keys that could escape their prefix.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
