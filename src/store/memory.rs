//! In-memory stores.
//!
//! Both stores are cheap to clone; clones share state. The object store
//! records how many uploads were started and how many were in flight when
//! each one began, and can be told to fail specific paths. URL resolution
//! yields once and tracks how many resolutions overlapped. The document
//! store can be told to fail reads or appends.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use tokio::sync::Mutex;

use super::{
    DocumentStore, ObjectStore, RecordField, StorageError, StorageResult, TransferProgress,
    UploadTask, sort_newest_first, validate_key,
};
use crate::types::{GalleryRecord, ImageMetadata};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct ObjectState {
    objects: Mutex<HashMap<String, StoredObject>>,
    failing: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    upload_calls: AtomicUsize,
    in_flight: AtomicUsize,
    starts: std::sync::Mutex<Vec<usize>>,
    resolving: AtomicUsize,
    resolve_peak: AtomicUsize,
}

#[derive(Clone)]
pub struct MemoryObjectStore {
    state: Arc<ObjectState>,
    chunk_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ObjectState::default()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Report progress every `chunk_size` bytes instead of every 64 KiB.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Make every upload to `path` fail until [`clear_failures`](Self::clear_failures).
    pub async fn fail_path(&self, path: &str) {
        self.state.failing.lock().await.insert(path.to_string());
    }

    pub async fn clear_failures(&self) {
        self.state.failing.lock().await.clear();
    }

    /// Make `resolve_url` fail with a backend error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of uploads started since creation.
    pub fn upload_calls(&self) -> usize {
        self.state.upload_calls.load(Ordering::SeqCst)
    }

    /// For each upload, in start order, how many others were in flight when it began.
    pub fn in_flight_at_start(&self) -> Vec<usize> {
        self.state
            .starts
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Most `resolve_url` calls that were in flight at once.
    pub fn max_concurrent_resolves(&self) -> usize {
        self.state.resolve_peak.load(Ordering::SeqCst)
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> StorageResult<String> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("object store unavailable".into()));
        }
        if !self.state.objects.lock().await.contains_key(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("memory://{path}?expires={expires}"))
    }

    pub async fn object(&self, path: &str) -> Option<StoredObject> {
        self.state.objects.lock().await.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.state.objects.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

struct Transfer {
    state: Arc<ObjectState>,
    path: String,
    content_type: String,
    data: Bytes,
    chunk_size: usize,
    sent: Option<u64>,
    finished: bool,
}

impl Transfer {
    fn finish(&mut self) {
        self.finished = true;
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn upload(&self, path: &str, data: Bytes, content_type: &str) -> UploadTask {
        self.state.upload_calls.fetch_add(1, Ordering::SeqCst);
        let transfer = Transfer {
            state: Arc::clone(&self.state),
            path: path.to_string(),
            content_type: content_type.to_string(),
            data,
            chunk_size: self.chunk_size,
            sent: None,
            finished: false,
        };

        stream::unfold(transfer, |mut t| async move {
            if t.finished {
                return None;
            }
            let sent = match t.sent {
                Some(sent) => sent,
                None => {
                    let before = t.state.in_flight.fetch_add(1, Ordering::SeqCst);
                    if let Ok(mut starts) = t.state.starts.lock() {
                        starts.push(before);
                    }
                    if let Err(e) = validate_key(&t.path) {
                        t.finish();
                        return Some((Err(e), t));
                    }
                    0
                }
            };

            // Suspension point between chunks so sibling uploads interleave.
            tokio::task::yield_now().await;

            if t.state.failing.lock().await.contains(&t.path) {
                t.finish();
                let err = StorageError::UploadFailed(format!("injected failure for {}", t.path));
                return Some((Err(err), t));
            }

            let total = t.data.len() as u64;
            let next = (sent + t.chunk_size as u64).min(total);
            if next >= total {
                let object = StoredObject {
                    data: t.data.clone(),
                    content_type: t.content_type.clone(),
                };
                t.state.objects.lock().await.insert(t.path.clone(), object);
                t.finish();
            }
            t.sent = Some(next);
            Some((
                Ok(TransferProgress {
                    bytes_transferred: next,
                    total_bytes: total,
                }),
                t,
            ))
        })
        .boxed()
    }

    async fn resolve_url(&self, path: &str, ttl: Duration) -> StorageResult<String> {
        let in_flight = self.state.resolving.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.resolve_peak.fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let url = self.signed_url(path, ttl).await;
        self.state.resolving.fetch_sub(1, Ordering::SeqCst);
        url
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.state.objects.lock().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        match self.state.objects.lock().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }
}

// =============================================================================
// Documents
// =============================================================================

#[derive(Default)]
struct DocumentState {
    records: Mutex<HashMap<String, GalleryRecord>>,
    fail_reads: AtomicBool,
    fail_appends: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<DocumentState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.state.fail_appends.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> StorageResult<()> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("document store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, record: &GalleryRecord) -> StorageResult<()> {
        self.state
            .records
            .lock()
            .await
            .insert(record.gallery_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, gallery_id: &str) -> StorageResult<Option<GalleryRecord>> {
        self.check_reads()?;
        Ok(self.state.records.lock().await.get(gallery_id).cloned())
    }

    async fn find_by_field(
        &self,
        field: RecordField,
        value: &str,
    ) -> StorageResult<Vec<GalleryRecord>> {
        let mut found: Vec<_> = self
            .list()
            .await?
            .into_iter()
            .filter(|r| field.value_of(r) == value)
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn list(&self) -> StorageResult<Vec<GalleryRecord>> {
        self.check_reads()?;
        let mut records: Vec<_> = self.state.records.lock().await.values().cloned().collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn append_image(&self, gallery_id: &str, image: &ImageMetadata) -> StorageResult<()> {
        if self.state.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("append rejected".into()));
        }
        let mut records = self.state.records.lock().await;
        let record = records
            .get_mut(gallery_id)
            .ok_or_else(|| StorageError::NotFound(gallery_id.to_string()))?;
        record.images.push(image.clone());
        Ok(())
    }

    async fn delete(&self, gallery_id: &str) -> StorageResult<()> {
        match self.state.records.lock().await.remove(gallery_id) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(gallery_id.to_string())),
        }
    }
}
