//! Client-facing gallery view.
//!
//! A client opens a gallery by id. The viewer does one point read of the
//! record, then resolves every image path into a time-bounded URL in parallel.
//! Any failure of either step is reported as [`GalleryView::Unavailable`];
//! a missing record is [`GalleryView::NotFound`]. Neither panics nor
//! propagates an error, so the page can always render something.
//!
//! The first `eager_count` images carry [`Loading::Eager`] so the top of the
//! page appears immediately; the rest load lazily.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use uuid::Uuid;

use crate::config::ViewerConfig;
use crate::store::{DocumentStore, ObjectStore};
use crate::types::{GalleryRecord, GallerySummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loading {
    Eager,
    Lazy,
}

impl Loading {
    /// Value of the HTML `loading` attribute.
    pub fn as_attr(self) -> &'static str {
        match self {
            Loading::Eager => "eager",
            Loading::Lazy => "lazy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewImage {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
    pub loading: Loading,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GalleryView {
    NotFound,
    /// The gallery exists but has no images yet.
    Empty(GallerySummary),
    Ready {
        gallery: GallerySummary,
        images: Vec<ViewImage>,
    },
    /// A store could not be reached; the reason is safe to log, not to show.
    Unavailable(String),
}

pub struct GalleryViewer {
    docs: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    eager_count: usize,
    url_ttl: Duration,
}

impl GalleryViewer {
    pub fn new(docs: Arc<dyn DocumentStore>, objects: Arc<dyn ObjectStore>, config: &ViewerConfig) -> Self {
        Self {
            docs,
            objects,
            eager_count: config.eager_count,
            url_ttl: Duration::from_secs(config.url_ttl_secs),
        }
    }

    pub async fn view_gallery(&self, gallery_id: &str) -> GalleryView {
        if gallery_id.trim().is_empty() {
            return GalleryView::NotFound;
        }
        let record = match self.docs.get(gallery_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return GalleryView::NotFound,
            Err(e) => {
                tracing::warn!(gallery_id, error = %e, "Gallery record unavailable");
                return GalleryView::Unavailable(e.to_string());
            }
        };

        let gallery = GallerySummary::from(&record);
        if record.images.is_empty() {
            return GalleryView::Empty(gallery);
        }

        match self.resolve_images(&record).await {
            Ok(images) => GalleryView::Ready { gallery, images },
            Err(e) => {
                tracing::warn!(gallery_id, error = %e, "Image URLs unavailable");
                GalleryView::Unavailable(e.to_string())
            }
        }
    }

    async fn resolve_images(&self, record: &GalleryRecord) -> crate::store::StorageResult<Vec<ViewImage>> {
        let urls = try_join_all(
            record
                .images
                .iter()
                .map(|image| self.objects.resolve_url(&image.path, self.url_ttl)),
        )
        .await?;

        Ok(record
            .images
            .iter()
            .zip(urls)
            .enumerate()
            .map(|(index, (image, url))| ViewImage {
                id: image.id,
                name: image.name.clone(),
                url,
                size: image.size,
                content_type: image.content_type.clone(),
                loading: if index < self.eager_count {
                    Loading::Eager
                } else {
                    Loading::Lazy
                },
            })
            .collect())
    }
}
