//! Gallery record management and owner-side admin operations.
//!
//! [`GalleryRecords`] owns every write to the document store:
//!
//! 1. [`create_gallery`](GalleryRecords::create_gallery) validates the owner's
//!    input and writes a record with an empty image list, before any upload.
//! 2. [`append_image`](GalleryRecords::append_image) adds one entry per
//!    completed upload through the store's atomic append, so concurrent
//!    completions never lose an entry.
//!
//! The admin screens build on the same handle: searching the gallery list,
//! deleting a gallery, and composing the "your gallery is ready" email.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::naming::gallery_link;
use crate::store::{DocumentStore, ObjectStore, RecordField, StorageError};
use crate::telemetry::{SharedTelemetry, TelemetryEvent};
use crate::types::{GalleryRecord, GallerySummary, ImageMetadata};

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Invalid gallery: {0}")]
    Validation(String),
    #[error("Gallery not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Owner input for a new gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGallery {
    pub name: String,
    pub client_name: String,
    pub client_email: String,
}

impl NewGallery {
    pub fn new(
        name: impl Into<String>,
        client_name: impl Into<String>,
        client_email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client_name: client_name.into(),
            client_email: client_email.into(),
        }
    }

    /// All fields required; the email must look like `local@domain`.
    pub fn validate(&self) -> Result<(), GalleryError> {
        if self.name.trim().is_empty() {
            return Err(GalleryError::Validation("gallery name is required".into()));
        }
        if self.client_name.trim().is_empty() {
            return Err(GalleryError::Validation("client name is required".into()));
        }
        let email = self.client_email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
        if !well_formed {
            return Err(GalleryError::Validation(format!(
                "client email {email:?} is not a valid address"
            )));
        }
        Ok(())
    }
}

/// What [`GalleryRecords::delete_gallery`] removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Remove the document only; stored objects stay behind.
    #[default]
    RecordOnly,
    /// Also delete every object the record references, best effort.
    WithObjects,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub objects_deleted: usize,
    /// Paths whose object could not be deleted.
    pub objects_failed: Vec<String>,
}

pub struct GalleryRecords {
    docs: Arc<dyn DocumentStore>,
    telemetry: SharedTelemetry,
}

impl GalleryRecords {
    pub fn new(docs: Arc<dyn DocumentStore>, telemetry: SharedTelemetry) -> Self {
        Self { docs, telemetry }
    }

    /// Validate input and write a fresh record with an empty image list.
    pub async fn create_gallery(&self, gallery: &NewGallery) -> Result<GalleryRecord, GalleryError> {
        gallery.validate()?;
        let record = GalleryRecord {
            gallery_id: Uuid::new_v4().to_string(),
            name: gallery.name.trim().to_string(),
            client_name: gallery.client_name.trim().to_string(),
            client_email: gallery.client_email.trim().to_string(),
            created_at: Utc::now(),
            images: Vec::new(),
        };
        self.docs.put(&record).await?;

        tracing::info!(gallery_id = %record.gallery_id, name = %record.name, "Gallery created");
        self.telemetry
            .log_event(TelemetryEvent::new("gallery_created").with("gallery_id", record.gallery_id.as_str()));
        Ok(record)
    }

    /// Append one image entry. Safe to call concurrently.
    pub async fn append_image(&self, gallery_id: &str, image: &ImageMetadata) -> Result<(), GalleryError> {
        match self.docs.append_image(gallery_id, image).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound(_)) => Err(GalleryError::NotFound(gallery_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, gallery_id: &str) -> Result<Option<GalleryRecord>, GalleryError> {
        Ok(self.docs.get(gallery_id).await?)
    }

    /// Newest-first summaries, optionally filtered.
    ///
    /// The search term matches case-insensitively anywhere in the gallery
    /// name, client name, or client email. A blank term lists everything.
    pub async fn list_galleries(&self, search: Option<&str>) -> Result<Vec<GallerySummary>, GalleryError> {
        let needle = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        Ok(self
            .docs
            .list()
            .await?
            .iter()
            .filter(|r| needle.is_empty() || matches_search(r, &needle))
            .map(GallerySummary::from)
            .collect())
    }

    /// Galleries delivered to one client address (exact match).
    pub async fn find_by_client_email(&self, email: &str) -> Result<Vec<GallerySummary>, GalleryError> {
        Ok(self
            .docs
            .find_by_field(RecordField::ClientEmail, email.trim())
            .await?
            .iter()
            .map(GallerySummary::from)
            .collect())
    }

    /// Delete a gallery's record, and with [`DeletePolicy::WithObjects`] its objects too.
    ///
    /// Object deletion is best effort: failures are logged and reported but do
    /// not keep the record alive.
    pub async fn delete_gallery(
        &self,
        gallery_id: &str,
        policy: DeletePolicy,
        objects: &dyn ObjectStore,
    ) -> Result<DeleteReport, GalleryError> {
        let record = self
            .docs
            .get(gallery_id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(gallery_id.to_string()))?;

        let mut report = DeleteReport::default();
        if policy == DeletePolicy::WithObjects {
            for image in &record.images {
                match objects.delete(&image.path).await {
                    Ok(()) => report.objects_deleted += 1,
                    Err(e) => {
                        tracing::warn!(path = %image.path, error = %e, "Failed to delete gallery object");
                        report.objects_failed.push(image.path.clone());
                    }
                }
            }
        }

        self.docs.delete(gallery_id).await?;
        tracing::info!(gallery_id, ?policy, "Gallery deleted");
        Ok(report)
    }
}

fn matches_search(record: &GalleryRecord, needle: &str) -> bool {
    [&record.name, &record.client_name, &record.client_email]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

// =============================================================================
// Client email
// =============================================================================

/// The "your gallery is ready" message for a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// `mailto:` link with percent-encoded subject and body.
    pub mailto: String,
}

pub fn compose_client_email(gallery: &GallerySummary, base_url: &str, studio_name: &str) -> ClientEmail {
    let link = gallery_link(base_url, &gallery.gallery_id);
    let subject = format!("Your Photo Gallery is Ready - {}", gallery.name);
    let body = format!(
        "Dear {client},\n\n\
         Your photo gallery is now ready to view!\n\n\
         Gallery: {name}\n\
         Link: {link}\n\n\
         Click the link above to access your photos. You can view and download the images.\n\n\
         Best regards,\n\
         {studio_name}",
        client = gallery.client_name,
        name = gallery.name,
    );
    let mailto = format!(
        "mailto:{}?subject={}&body={}",
        gallery.client_email,
        urlencoding::encode(&subject),
        urlencoding::encode(&body)
    );
    ClientEmail {
        to: gallery.client_email.clone(),
        subject,
        body,
        mailto,
    }
}
