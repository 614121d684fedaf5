//! Upload sessions and batched uploads.
//!
//! An [`UploadSession`] holds everything one intake run needs: the admitted
//! items, the limits they were admitted under, and the identifier of the
//! gallery they belong to once it has been created. The session is the only
//! owner of its items; nothing is global.
//!
//! ## Pipeline
//!
//! ```text
//! select ──► compress ──► create_gallery ──► upload
//! (admit)    (rayon)      (empty record)     (batches of N, appends per item)
//! ```
//!
//! ## Batching
//!
//! [`UploadBatcher`] splits the pending items into batches of `batch_size`.
//! Uploads inside a batch run concurrently; the next batch starts only after
//! every upload of the current one has settled. Each upload owns a disjoint
//! `&mut UploadItem`, so progress is written straight into the item.
//!
//! ## Retry
//!
//! Running the upload again only touches unfinished items:
//!
//! | Item state | On retry |
//! |---|---|
//! | uploaded + recorded | skipped |
//! | uploaded, metadata append failed | append only, no re-upload |
//! | failed or never started | uploaded, then appended |
//!
//! ## Object paths
//!
//! Objects are stored at `galleries/{gallery_id}/{file_name}`. Files from
//! different folders can share a name, so items are renamed on entry to the
//! session (and again before a run) until every storage segment is unique.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use futures::future::{join_all, try_join_all};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::compress::{CompressOutcome, Compressor};
use crate::gallery::{GalleryError, GalleryRecords, NewGallery};
use crate::intake::{Candidate, IntakeError, Limits, Rejection, admit};
use crate::naming::{storage_path, unique_file_name};
use crate::store::ObjectStore;
use crate::telemetry::{SharedTelemetry, TelemetryEvent};
use crate::types::{ImageMetadata, ItemStatus, UploadItem};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No gallery has been created for this session")]
    NoGallery,
    #[error("Please select at least one image")]
    NoItems,
    #[error("{0} item(s) are still being compressed")]
    CompressionPending(usize),
    #[error("Compression worker failed: {0}")]
    Compression(String),
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    BatchStarted {
        batch: usize,
        batches: usize,
        size: usize,
    },
    Progress {
        item_id: Uuid,
        file_name: String,
        percent: f64,
    },
    ItemUploaded {
        item_id: Uuid,
        path: String,
    },
    ItemFailed {
        item_id: Uuid,
        file_name: String,
        error: String,
    },
    MetadataFailed {
        item_id: Uuid,
        file_name: String,
        error: String,
    },
    /// Every upload of batch `batch` (1-based) has settled. `completed` counts
    /// session items that are uploaded and recorded.
    BatchSettled {
        batch: usize,
        batches: usize,
        completed: usize,
        total: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub item_id: Uuid,
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    /// Items that became uploaded and recorded during this run.
    pub uploaded: usize,
    /// Items already complete before this run.
    pub skipped: usize,
    pub failed: Vec<ItemFailure>,
    /// Uploaded items whose metadata append failed; a retry re-appends them.
    pub metadata_failures: Vec<ItemFailure>,
    pub batches: usize,
    /// Payload bytes of the items handled in this run.
    pub total_bytes: u64,
    pub duration: Duration,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.metadata_failures.is_empty()
    }
}

enum ItemOutcome {
    Completed,
    UploadFailed(ItemFailure),
    MetadataFailed(ItemFailure),
}

/// Drives batched uploads for one gallery.
pub struct UploadBatcher {
    objects: Arc<dyn ObjectStore>,
    records: Arc<GalleryRecords>,
    batch_size: usize,
    telemetry: SharedTelemetry,
    events: Option<UnboundedSender<UploadEvent>>,
}

impl UploadBatcher {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<GalleryRecords>,
        batch_size: usize,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            objects,
            records,
            batch_size: batch_size.max(1),
            telemetry,
            events: None,
        }
    }

    /// Forward [`UploadEvent`]s to a channel. Send errors are ignored.
    pub fn with_events(mut self, events: UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Upload and record every unfinished item, batch by batch.
    pub async fn run(&self, gallery_id: &str, items: &mut [UploadItem]) -> UploadReport {
        let started = Instant::now();
        assign_unique_names(items);
        let total = items.len();
        let skipped = items.iter().filter(|i| i.is_done()).count();
        let mut pending: Vec<&mut UploadItem> = items.iter_mut().filter(|i| !i.is_done()).collect();
        let batches = pending.len().div_ceil(self.batch_size);

        let mut report = UploadReport {
            skipped,
            batches,
            total_bytes: pending.iter().map(|i| i.size()).sum(),
            ..Default::default()
        };
        let mut completed = skipped;

        tracing::info!(gallery_id, pending = pending.len(), skipped, batches, "Starting upload");

        for (index, batch) in pending.chunks_mut(self.batch_size).enumerate() {
            let batch_no = index + 1;
            self.emit(UploadEvent::BatchStarted {
                batch: batch_no,
                batches,
                size: batch.len(),
            });

            let uploads = batch
                .iter_mut()
                .map(|item| self.process_item(gallery_id, &mut **item));
            for outcome in join_all(uploads).await {
                match outcome {
                    ItemOutcome::Completed => {
                        report.uploaded += 1;
                        completed += 1;
                    }
                    ItemOutcome::UploadFailed(failure) => report.failed.push(failure),
                    ItemOutcome::MetadataFailed(failure) => report.metadata_failures.push(failure),
                }
            }

            tracing::info!(batch = batch_no, batches, completed, total, "Batch settled");
            self.emit(UploadEvent::BatchSettled {
                batch: batch_no,
                batches,
                completed,
                total,
            });
        }

        report.duration = started.elapsed();
        self.report_telemetry(gallery_id, &report);
        report
    }

    fn report_telemetry(&self, gallery_id: &str, report: &UploadReport) {
        if report.is_complete() {
            self.telemetry.log_event(
                TelemetryEvent::new("gallery_upload_complete")
                    .with("gallery_id", gallery_id)
                    .with("image_count", report.uploaded + report.skipped)
                    .with("upload_duration_ms", report.duration.as_millis() as u64)
                    .with("total_size", report.total_bytes),
            );
            return;
        }
        let message = format!(
            "{} upload(s) failed, {} metadata write(s) failed",
            report.failed.len(),
            report.metadata_failures.len()
        );
        self.telemetry.log_event(
            TelemetryEvent::new("gallery_upload_error")
                .with("gallery_id", gallery_id)
                .with("error_message", message),
        );
    }

    async fn process_item(&self, gallery_id: &str, item: &mut UploadItem) -> ItemOutcome {
        if !item.uploaded {
            if let Err(error) = self.upload_item(gallery_id, item).await {
                tracing::warn!(file = %item.file_name, %error, "Upload failed");
                item.error = Some(error.clone());
                item.progress = 0.0;
                self.emit(UploadEvent::ItemFailed {
                    item_id: item.id,
                    file_name: item.file_name.clone(),
                    error: error.clone(),
                });
                return ItemOutcome::UploadFailed(ItemFailure {
                    item_id: item.id,
                    file_name: item.file_name.clone(),
                    error,
                });
            }
        }

        let path = item
            .path
            .clone()
            .unwrap_or_else(|| storage_path(gallery_id, &item.file_name));
        let metadata = ImageMetadata {
            id: item.id,
            name: item.file_name.clone(),
            path,
            size: item.size(),
            content_type: item.content_type.clone(),
            created_at: Utc::now(),
        };
        match self.records.append_image(gallery_id, &metadata).await {
            Ok(()) => {
                item.recorded = true;
                item.error = None;
                ItemOutcome::Completed
            }
            Err(e) => {
                let error = format!("metadata write failed: {e}");
                tracing::warn!(file = %item.file_name, %error, "Image uploaded but not recorded");
                item.error = Some(error.clone());
                self.emit(UploadEvent::MetadataFailed {
                    item_id: item.id,
                    file_name: item.file_name.clone(),
                    error: error.clone(),
                });
                ItemOutcome::MetadataFailed(ItemFailure {
                    item_id: item.id,
                    file_name: item.file_name.clone(),
                    error,
                })
            }
        }
    }

    /// Drive the object-store transfer, mirroring its progress into the item.
    async fn upload_item(&self, gallery_id: &str, item: &mut UploadItem) -> Result<(), String> {
        let path = storage_path(gallery_id, &item.file_name);
        item.path = Some(path.clone());
        item.error = None;
        item.progress = 0.0;

        let mut transfer = self
            .objects
            .upload(&path, item.data.clone(), &item.content_type);
        while let Some(step) = transfer.next().await {
            let progress = step.map_err(|e| e.to_string())?;
            item.progress = progress.percent();
            self.emit(UploadEvent::Progress {
                item_id: item.id,
                file_name: item.file_name.clone(),
                percent: item.progress,
            });
        }

        item.uploaded = true;
        item.progress = 100.0;
        self.emit(UploadEvent::ItemUploaded {
            item_id: item.id,
            path,
        });
        Ok(())
    }
}

/// Rename items whose storage segment repeats an earlier item's.
///
/// Earlier items keep their names, so running this again changes nothing.
fn assign_unique_names(items: &mut [UploadItem]) {
    let mut taken = HashSet::new();
    for item in items {
        let name = unique_file_name(&item.file_name, &mut taken);
        if name != item.file_name {
            tracing::info!(from = %item.file_name, to = %name, "Renamed duplicate file name");
            item.file_name = name;
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// One intake run: admitted items plus the gallery they go to.
#[derive(Debug, Default)]
pub struct UploadSession {
    gallery_id: Option<String>,
    items: Vec<UploadItem>,
    limits: Limits,
}

impl UploadSession {
    pub fn new(limits: Limits) -> Self {
        Self {
            gallery_id: None,
            items: Vec::new(),
            limits,
        }
    }

    /// Admit candidates against the session limits and load the accepted ones.
    ///
    /// Returns the rejections; accepted files are appended to the session.
    pub async fn select(&mut self, candidates: Vec<Candidate>) -> Result<Vec<Rejection>, IntakeError> {
        let admission = admit(self.total_size(), candidates, &self.limits);
        let loaded = try_join_all(admission.accepted.into_iter().map(Candidate::load)).await?;
        for rejection in &admission.rejected {
            tracing::warn!(%rejection, "File rejected");
        }
        self.items.extend(loaded);
        assign_unique_names(&mut self.items);
        Ok(admission.rejected)
    }

    /// Add already-loaded items without admission checks.
    pub fn add_items(&mut self, items: impl IntoIterator<Item = UploadItem>) {
        self.items.extend(items);
        assign_unique_names(&mut self.items);
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn gallery_id(&self) -> Option<&str> {
        self.gallery_id.as_deref()
    }

    pub fn remove(&mut self, id: Uuid) -> Option<UploadItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    /// Drop every item and forget the gallery, so the next create starts fresh.
    pub fn reset(&mut self) {
        self.items.clear();
        self.gallery_id = None;
    }

    pub fn snapshot(&self) -> Vec<ItemStatus> {
        self.items.iter().map(ItemStatus::from).collect()
    }

    /// Current payload bytes across all items.
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|i| i.size()).sum()
    }

    /// Fraction of the session cap in use, 0.0–1.0.
    pub fn limit_usage(&self) -> f64 {
        if self.limits.max_total_size == 0 {
            return 0.0;
        }
        (self.total_size() as f64 / self.limits.max_total_size as f64).min(1.0)
    }

    /// Compress all pending items on the rayon pool.
    pub async fn compress(&mut self, compressor: Arc<Compressor>) -> Result<Vec<CompressOutcome>, UploadError> {
        let mut items = std::mem::take(&mut self.items);
        let (items, outcomes) = tokio::task::spawn_blocking(move || {
            let outcomes = compressor.compress_items(&mut items);
            (items, outcomes)
        })
        .await
        .map_err(|e| UploadError::Compression(e.to_string()))?;
        self.items = items;
        Ok(outcomes)
    }

    /// Create the gallery record once; later calls return the same id.
    pub async fn create_gallery(
        &mut self,
        records: &GalleryRecords,
        gallery: &NewGallery,
    ) -> Result<String, GalleryError> {
        if let Some(id) = &self.gallery_id {
            return Ok(id.clone());
        }
        let record = records.create_gallery(gallery).await?;
        self.gallery_id = Some(record.gallery_id.clone());
        Ok(record.gallery_id)
    }

    /// Upload every unfinished item to the session's gallery.
    pub async fn upload(&mut self, batcher: &UploadBatcher) -> Result<UploadReport, UploadError> {
        let gallery_id = self.gallery_id.clone().ok_or(UploadError::NoGallery)?;
        if self.items.is_empty() {
            return Err(UploadError::NoItems);
        }
        let compressing = self.items.iter().filter(|i| i.compressing).count();
        if compressing > 0 {
            return Err(UploadError::CompressionPending(compressing));
        }
        Ok(batcher.run(&gallery_id, &mut self.items).await)
    }
}
