//! Filesystem stores rooted at the data directory.
//!
//! ```text
//! <data>/
//! ├── .url-secret            # signs resolved URLs, created on first open
//! ├── objects/
//! │   └── galleries/<id>/<file>
//! └── galleries/
//!     └── <id>.json          # one pretty-printed GalleryRecord per gallery
//! ```
//!
//! Objects are written to a `.part` sibling in 64 KiB chunks and renamed into
//! place once complete, so a failed upload never leaves a truncated object at
//! its final path. Resolved URLs are `file://` URLs carrying an `expires` unix
//! timestamp and a SHA-256 `token` over the secret, the object path and the
//! expiry; [`FsObjectStore::verify_url_token`] checks both.
//!
//! Records have no native append. [`FsDocumentStore`] serializes every write
//! behind one async lock and replaces the file through an atomic rename.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    DocumentStore, ObjectStore, RecordField, StorageError, StorageResult, TransferProgress,
    UploadTask, sort_newest_first, validate_key,
};
use crate::types::{GalleryRecord, ImageMetadata};

pub const OBJECTS_DIR: &str = "objects";
pub const GALLERIES_DIR: &str = "galleries";
const SECRET_FILE: &str = ".url-secret";
const CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// Objects
// =============================================================================

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    secret: String,
}

impl FsObjectStore {
    /// Open (creating if needed) the object store under `data_dir`.
    pub async fn open(data_dir: &Path) -> StorageResult<Self> {
        let root = data_dir.join(OBJECTS_DIR);
        fs::create_dir_all(&root).await?;
        let root = fs::canonicalize(&root).await?;
        let secret = load_or_create_secret(&data_dir.join(SECRET_FILE)).await?;
        Ok(Self { root, secret })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Signature over the object path and its expiry.
    pub fn url_token(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// True when `token` was issued for `key` and `expires` is not in the past.
    pub fn verify_url_token(&self, key: &str, expires: i64, token: &str, now: i64) -> bool {
        expires >= now && self.url_token(key, expires) == token
    }
}

async fn load_or_create_secret(path: &Path) -> StorageResult<String> {
    match fs::read_to_string(path).await {
        Ok(secret) if !secret.trim().is_empty() => Ok(secret.trim().to_string()),
        Ok(_) => write_secret(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => write_secret(path).await,
        Err(e) => Err(e.into()),
    }
}

async fn write_secret(path: &Path) -> StorageResult<String> {
    let secret = Uuid::new_v4().simple().to_string();
    fs::write(path, &secret).await?;
    Ok(secret)
}

fn file_url(path: &Path) -> String {
    let encoded: Vec<String> = path
        .to_string_lossy()
        .split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect();
    format!("file://{}", encoded.join("/"))
}

struct FsTransfer {
    target: PathBuf,
    part: PathBuf,
    data: Bytes,
    sent: u64,
    file: Option<fs::File>,
    finished: bool,
}

impl FsTransfer {
    async fn step(&mut self) -> StorageResult<TransferProgress> {
        if self.file.is_none() {
            if let Some(parent) = self.target.parent() {
                fs::create_dir_all(parent).await?;
            }
            self.file = Some(fs::File::create(&self.part).await?);
        }
        let total = self.data.len() as u64;
        let next = (self.sent + CHUNK_SIZE as u64).min(total);
        if let Some(file) = self.file.as_mut() {
            file.write_all(&self.data[self.sent as usize..next as usize])
                .await?;
        }
        self.sent = next;

        if next >= total {
            if let Some(mut file) = self.file.take() {
                file.flush().await?;
                file.sync_all().await?;
            }
            fs::rename(&self.part, &self.target).await?;
            self.finished = true;
        }
        Ok(TransferProgress {
            bytes_transferred: next,
            total_bytes: total,
        })
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn upload(&self, path: &str, data: Bytes, _content_type: &str) -> UploadTask {
        let target = match self.object_path(path) {
            Ok(target) => target,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let mut part = target.clone().into_os_string();
        part.push(".part");
        let transfer = FsTransfer {
            target,
            part: PathBuf::from(part),
            data,
            sent: 0,
            file: None,
            finished: false,
        };

        stream::unfold(transfer, |mut t| async move {
            if t.finished {
                return None;
            }
            match t.step().await {
                Ok(progress) => Some((Ok(progress), t)),
                Err(e) => {
                    t.finished = true;
                    t.file = None;
                    let _ = fs::remove_file(&t.part).await;
                    let err = StorageError::UploadFailed(format!(
                        "{}: {e}",
                        t.target.display()
                    ));
                    Some((Err(err), t))
                }
            }
        })
        .boxed()
    }

    async fn resolve_url(&self, path: &str, ttl: Duration) -> StorageResult<String> {
        let file = self.object_path(path)?;
        if !fs::try_exists(&file).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let token = self.url_token(path, expires);
        Ok(format!("{}?expires={expires}&token={token}", file_url(&file)))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(fs::try_exists(self.object_path(path)?).await?)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        match fs::remove_file(self.object_path(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Documents
// =============================================================================

#[derive(Debug)]
pub struct FsDocumentStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FsDocumentStore {
    pub async fn open(data_dir: &Path) -> StorageResult<Self> {
        let dir = data_dir.join(GALLERIES_DIR);
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, gallery_id: &str) -> StorageResult<PathBuf> {
        let valid = !gallery_id.is_empty()
            && gallery_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(gallery_id.to_string()));
        }
        Ok(self.dir.join(format!("{gallery_id}.json")))
    }

    async fn read(path: &Path) -> StorageResult<Option<GalleryRecord>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temporary sibling, then rename over the target.
    async fn write_atomic(path: &Path, record: &GalleryRecord) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, record: &GalleryRecord) -> StorageResult<()> {
        let path = self.record_path(&record.gallery_id)?;
        let _guard = self.write_lock.lock().await;
        Self::write_atomic(&path, record).await
    }

    async fn get(&self, gallery_id: &str) -> StorageResult<Option<GalleryRecord>> {
        let path = match self.record_path(gallery_id) {
            Ok(path) => path,
            // An id that could never have been written is simply absent.
            Err(StorageError::InvalidKey(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Self::read(&path).await
    }

    async fn find_by_field(
        &self,
        field: RecordField,
        value: &str,
    ) -> StorageResult<Vec<GalleryRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| field.value_of(r) == value)
            .collect())
    }

    async fn list(&self) -> StorageResult<Vec<GalleryRecord>> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable gallery record");
                }
            }
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn append_image(&self, gallery_id: &str, image: &ImageMetadata) -> StorageResult<()> {
        let path = self.record_path(gallery_id)?;
        let _guard = self.write_lock.lock().await;
        let mut record = Self::read(&path)
            .await?
            .ok_or_else(|| StorageError::NotFound(gallery_id.to_string()))?;
        record.images.push(image.clone());
        Self::write_atomic(&path, &record).await
    }

    async fn delete(&self, gallery_id: &str) -> StorageResult<()> {
        let path = self.record_path(gallery_id)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(gallery_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    fn record(id: &str) -> GalleryRecord {
        GalleryRecord {
            gallery_id: id.into(),
            name: "Wedding".into(),
            client_name: "Jane".into(),
            client_email: "jane@example.com".into(),
            created_at: Utc::now(),
            images: vec![],
        }
    }

    fn image(name: &str) -> ImageMetadata {
        ImageMetadata {
            id: Uuid::new_v4(),
            name: name.into(),
            path: format!("galleries/g1/{name}"),
            size: 1,
            content_type: "image/jpeg".into(),
            created_at: Utc::now(),
        }
    }

    // =========================================================================
    // FsObjectStore
    // =========================================================================

    #[tokio::test]
    async fn upload_writes_object_in_chunks() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::open(tmp.path()).await.unwrap();
        let data = Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 10]);

        let progress: Vec<_> = store
            .upload("galleries/g1/a.jpg", data.clone(), "image/jpeg")
            .try_collect()
            .await
            .unwrap();

        assert_eq!(progress.len(), 3);
        assert_eq!(progress.last().unwrap().percent(), 100.0);
        let written = std::fs::read(store.root().join("galleries/g1/a.jpg")).unwrap();
        assert_eq!(written, data.to_vec());
        assert!(!store.root().join("galleries/g1/a.jpg.part").exists());
    }

    #[tokio::test]
    async fn upload_rejects_escaping_path() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::open(tmp.path()).await.unwrap();
        let result: StorageResult<Vec<_>> = store
            .upload("../outside.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .try_collect()
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn resolved_url_carries_valid_token() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::open(tmp.path()).await.unwrap();
        let _: Vec<_> = store
            .upload("galleries/g1/my photo.jpg", Bytes::from_static(b"abc"), "image/jpeg")
            .try_collect()
            .await
            .unwrap();

        let url = store
            .resolve_url("galleries/g1/my photo.jpg", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains("my%20photo.jpg?expires="));

        let query = url.split_once('?').unwrap().1;
        let mut expires = 0;
        let mut token = "";
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("token", v) => token = v,
                _ => {}
            }
        }
        let now = Utc::now().timestamp();
        assert!(store.verify_url_token("galleries/g1/my photo.jpg", expires, token, now));
        assert!(!store.verify_url_token("galleries/g1/other.jpg", expires, token, now));
        assert!(!store.verify_url_token("galleries/g1/my photo.jpg", expires, token, expires + 1));
    }

    #[tokio::test]
    async fn secret_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let first = FsObjectStore::open(tmp.path()).await.unwrap();
        let second = FsObjectStore::open(tmp.path()).await.unwrap();
        assert_eq!(first.url_token("a", 1), second.url_token("a", 1));
    }

    #[tokio::test]
    async fn resolve_and_delete_missing_object() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::open(tmp.path()).await.unwrap();
        let url = store.resolve_url("galleries/g1/x.jpg", Duration::from_secs(1)).await;
        assert!(matches!(url, Err(StorageError::NotFound(_))));
        let deleted = store.delete("galleries/g1/x.jpg").await;
        assert!(matches!(deleted, Err(StorageError::NotFound(_))));
    }

    // =========================================================================
    // FsDocumentStore
    // =========================================================================

    #[tokio::test]
    async fn put_then_get_roundtrips_record() {
        let tmp = TempDir::new().unwrap();
        let store = FsDocumentStore::open(tmp.path()).await.unwrap();
        let rec = record("g1");
        store.put(&rec).await.unwrap();

        assert_eq!(store.get("g1").await.unwrap(), Some(rec));
        assert!(tmp.path().join("galleries/g1.json").exists());
    }

    #[tokio::test]
    async fn get_unknown_or_malformed_id_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FsDocumentStore::open(tmp.path()).await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.get("../etc/passwd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_appends_all_land() {
        let tmp = TempDir::new().unwrap();
        let store = FsDocumentStore::open(tmp.path()).await.unwrap();
        store.put(&record("g1")).await.unwrap();

        let images: Vec<_> = (0..12).map(|i| image(&format!("{i}.jpg"))).collect();
        let appends = images.iter().map(|img| store.append_image("g1", img));
        for result in futures::future::join_all(appends).await {
            result.unwrap();
        }
        assert_eq!(store.get("g1").await.unwrap().unwrap().images.len(), 12);
    }

    #[tokio::test]
    async fn list_skips_corrupt_files() {
        let tmp = TempDir::new().unwrap();
        let store = FsDocumentStore::open(tmp.path()).await.unwrap();
        store.put(&record("g1")).await.unwrap();
        std::fs::write(tmp.path().join("galleries/broken.json"), "{not json").unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let tmp = TempDir::new().unwrap();
        let store = FsDocumentStore::open(tmp.path()).await.unwrap();
        store.put(&record("g1")).await.unwrap();
        store.delete("g1").await.unwrap();
        assert!(store.get("g1").await.unwrap().is_none());
        assert!(matches!(store.delete("g1").await, Err(StorageError::NotFound(_))));
    }
}
