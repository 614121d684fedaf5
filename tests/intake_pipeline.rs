//! End-to-end intake against the filesystem stores.
//!
//! Writes real image files into a temp directory, runs the owner's flow
//! (select → compress → create → upload), then reopens the data directory
//! and checks what a client would see.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};
use studio_gallery::compress::Compressor;
use studio_gallery::config::{CompressionConfig, UploadConfig, ViewerConfig};
use studio_gallery::gallery::{DeletePolicy, GalleryRecords, NewGallery};
use studio_gallery::intake::{self, Limits};
use studio_gallery::store::DocumentStore;
use studio_gallery::store::fs::{FsDocumentStore, FsObjectStore};
use studio_gallery::telemetry;
use studio_gallery::upload::{UploadBatcher, UploadSession};
use studio_gallery::viewer::{GalleryView, GalleryViewer, Loading};
use tempfile::TempDir;

fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * 7 + y * 13) % 31) as u8])
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 95);
    DynamicImage::ImageRgb8(img).write_with_encoder(encoder).unwrap();
    std::fs::write(path, buf).unwrap();
}

struct Studio {
    _tmp: TempDir,
    data: std::path::PathBuf,
    photos: std::path::PathBuf,
}

fn studio() -> Studio {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let photos = tmp.path().join("photos");
    std::fs::create_dir_all(&photos).unwrap();
    write_jpeg(&photos.join("01-ceremony.jpg"), 2400, 1600);
    write_jpeg(&photos.join("02-rings.jpg"), 640, 480);
    write_jpeg(&photos.join("03-dance.jpg"), 800, 600);
    std::fs::write(photos.join("notes.txt"), "shot list").unwrap();
    Studio {
        _tmp: tmp,
        data,
        photos,
    }
}

/// Runs the full owner flow and returns the new gallery id.
async fn publish(studio: &Studio) -> String {
    let objects = Arc::new(FsObjectStore::open(&studio.data).await.unwrap());
    let docs = Arc::new(FsDocumentStore::open(&studio.data).await.unwrap());
    let records = Arc::new(GalleryRecords::new(docs, telemetry::noop()));

    let mut session = UploadSession::new(Limits::from(&UploadConfig::default()));
    let candidates = intake::read_candidates(std::slice::from_ref(&studio.photos)).unwrap();
    let rejected = session.select(candidates).await.unwrap();
    assert!(rejected.is_empty());
    assert_eq!(session.items().len(), 3);

    let compressor = Arc::new(Compressor::from_config(&CompressionConfig::default(), telemetry::noop()));
    session.compress(compressor).await.unwrap();
    let ceremony = &session.items()[0];
    assert_eq!(ceremony.file_name, "01-ceremony.jpg");
    assert!(ceremony.compressed_size.unwrap() < ceremony.original_size);

    let gallery = NewGallery::new("Smith Wedding", "Jane Smith", "jane@example.com");
    let gallery_id = session.create_gallery(&records, &gallery).await.unwrap();

    let batcher = UploadBatcher::new(objects, records, 2, telemetry::noop());
    let report = session.upload(&batcher).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.uploaded, 3);
    assert_eq!(report.batches, 2);
    assert!(session.items().iter().all(|i| i.is_done()));

    gallery_id
}

#[tokio::test]
async fn published_gallery_survives_reopen() {
    let studio = studio();
    let gallery_id = publish(&studio).await;

    let docs = FsDocumentStore::open(&studio.data).await.unwrap();
    let record = docs.get(&gallery_id).await.unwrap().expect("record persisted");
    assert_eq!(record.name, "Smith Wedding");
    let names: BTreeSet<_> = record.images.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(
        names,
        BTreeSet::from(["01-ceremony.jpg", "02-rings.jpg", "03-dance.jpg"])
    );

    for image in &record.images {
        let file = studio.data.join("objects").join(&image.path);
        assert_eq!(std::fs::metadata(&file).unwrap().len(), image.size);
        assert!(image.path.starts_with(&format!("galleries/{gallery_id}/")));
    }
}

#[tokio::test]
async fn client_view_resolves_signed_urls() {
    let studio = studio();
    let gallery_id = publish(&studio).await;

    let objects = FsObjectStore::open(&studio.data).await.unwrap();
    let docs = FsDocumentStore::open(&studio.data).await.unwrap();
    let viewer = GalleryViewer::new(Arc::new(docs), Arc::new(objects), &ViewerConfig::default());

    let GalleryView::Ready { gallery, images } = viewer.view_gallery(&gallery_id).await else {
        panic!("expected a ready gallery");
    };
    assert_eq!(gallery.client_name, "Jane Smith");
    assert_eq!(gallery.image_count, 3);
    assert!(images.iter().all(|i| i.loading == Loading::Eager));
    for image in &images {
        assert!(image.url.starts_with("file://"), "{}", image.url);
        assert!(image.url.contains("token="));
    }
}

#[tokio::test]
async fn purge_removes_record_and_objects() {
    let studio = studio();
    let gallery_id = publish(&studio).await;

    let objects = Arc::new(FsObjectStore::open(&studio.data).await.unwrap());
    let docs = Arc::new(FsDocumentStore::open(&studio.data).await.unwrap());
    let records = GalleryRecords::new(docs.clone(), telemetry::noop());

    let report = records
        .delete_gallery(&gallery_id, DeletePolicy::WithObjects, objects.as_ref())
        .await
        .unwrap();
    assert_eq!(report.objects_deleted, 3);
    assert!(report.objects_failed.is_empty());

    let viewer = GalleryViewer::new(docs, objects, &ViewerConfig::default());
    assert_eq!(viewer.view_gallery(&gallery_id).await, GalleryView::NotFound);
    let gallery_dir = studio.data.join("objects/galleries").join(&gallery_id);
    let remaining = std::fs::read_dir(&gallery_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn same_named_files_from_two_cards_both_survive() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let shoot = tmp.path().join("shoot");
    for (card, byte, len) in [("card1", 1u8, 300_000usize), ("card2", 2u8, 200_000)] {
        std::fs::create_dir_all(shoot.join(card)).unwrap();
        std::fs::write(shoot.join(card).join("IMG_0001.jpg"), vec![byte; len]).unwrap();
    }

    let objects = Arc::new(FsObjectStore::open(&data).await.unwrap());
    let docs = Arc::new(FsDocumentStore::open(&data).await.unwrap());
    let records = Arc::new(GalleryRecords::new(docs.clone(), telemetry::noop()));

    let mut session = UploadSession::new(Limits::from(&UploadConfig::default()));
    let candidates = intake::read_candidates(std::slice::from_ref(&shoot)).unwrap();
    assert!(session.select(candidates).await.unwrap().is_empty());
    // Opaque payloads fail to decode and are kept as selected.
    let compressor = Arc::new(Compressor::from_config(&CompressionConfig::default(), telemetry::noop()));
    session.compress(compressor).await.unwrap();

    let gallery = NewGallery::new("Two Cards", "Jane Smith", "jane@example.com");
    let gallery_id = session.create_gallery(&records, &gallery).await.unwrap();
    let report = session
        .upload(&UploadBatcher::new(objects, records, 5, telemetry::noop()))
        .await
        .unwrap();
    assert!(report.is_complete(), "{:?}", report.failed);
    assert_eq!(report.uploaded, 2);

    let record = docs.get(&gallery_id).await.unwrap().unwrap();
    let mut stored: Vec<_> = record
        .images
        .iter()
        .map(|image| {
            let bytes = std::fs::read(data.join("objects").join(&image.path)).unwrap();
            (image.name.clone(), bytes.len(), bytes.iter().all(|b| *b == bytes[0]), bytes[0])
        })
        .collect();
    stored.sort();
    assert_eq!(
        stored,
        vec![
            ("IMG_0001-2.jpg".to_string(), 200_000, true, 2),
            ("IMG_0001.jpg".to_string(), 300_000, true, 1),
        ]
    );
}
