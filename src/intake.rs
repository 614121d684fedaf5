//! Admission control for selected files.
//!
//! Files are checked when they are selected, before anything is read or
//! compressed. Rejected files are reported and never enter the session.
//!
//! | Check | Default | Rejection |
//! |---|---|---|
//! | Content type is `image/*` | | [`RejectReason::UnsupportedType`] |
//! | Per-file size | 10 MiB | [`RejectReason::FileTooLarge`] |
//! | Session total (already selected + accepted so far) | 50 MiB | [`RejectReason::SessionLimit`] |
//!
//! The session limit is cumulative within one selection: of six 9 MiB files,
//! the first five are accepted and the sixth is rejected.
//!
//! Sizes are the on-disk sizes at selection time. Compression later only
//! shrinks payloads, so an admitted session never exceeds the cap.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::UploadConfig;
use crate::naming::{content_type_for, is_supported_image};
use crate::types::UploadItem;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Per-file and per-session byte limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_total_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for Limits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_total_size: config.max_total_size,
        }
    }
}

/// Where a candidate's bytes will be read from.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSource {
    File(PathBuf),
    Memory(Bytes),
}

/// A selected file that has not been read yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub source: CandidateSource,
}

impl Candidate {
    /// Describe a file on disk. Only its metadata is read.
    pub fn from_path(path: &Path) -> Result<Self, IntakeError> {
        let size = std::fs::metadata(path)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content_type = content_type_for(&file_name)
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        Ok(Self {
            file_name,
            content_type,
            size,
            source: CandidateSource::File(path.to_path_buf()),
        })
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: data.len() as u64,
            source: CandidateSource::Memory(data),
        }
    }

    /// Read the payload and turn the candidate into a session item.
    pub async fn load(self) -> Result<UploadItem, IntakeError> {
        let (data, preview) = match self.source {
            CandidateSource::File(path) => {
                let data = tokio::fs::read(&path).await?;
                (Bytes::from(data), path.display().to_string())
            }
            CandidateSource::Memory(data) => (data, format!("memory:{}", self.file_name)),
        };
        Ok(UploadItem::new(self.file_name, self.content_type, data, preview))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("not an image ({0})")]
    UnsupportedType(String),
    #[error("{} exceeds the {} per-file limit", format_mib(*size), format_mib(*limit))]
    FileTooLarge { size: u64, limit: u64 },
    #[error("{} would exceed the session limit ({} remaining)", format_mib(*size), format_mib(*remaining))]
    SessionLimit { size: u64, remaining: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub file_name: String,
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file_name, self.reason)
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Admission {
    pub accepted: Vec<Candidate>,
    pub rejected: Vec<Rejection>,
}

impl Admission {
    pub fn accepted_size(&self) -> u64 {
        self.accepted.iter().map(|c| c.size).sum()
    }
}

/// Split candidates into accepted and rejected, in selection order.
///
/// `current_total` is the byte size of items already in the session.
pub fn admit(current_total: u64, candidates: Vec<Candidate>, limits: &Limits) -> Admission {
    let mut admission = Admission::default();
    let mut running = current_total;

    for candidate in candidates {
        let reason = if !is_supported_image(&candidate.content_type) {
            Some(RejectReason::UnsupportedType(candidate.content_type.clone()))
        } else if candidate.size > limits.max_file_size {
            Some(RejectReason::FileTooLarge {
                size: candidate.size,
                limit: limits.max_file_size,
            })
        } else if running + candidate.size > limits.max_total_size {
            Some(RejectReason::SessionLimit {
                size: candidate.size,
                remaining: limits.max_total_size.saturating_sub(running),
            })
        } else {
            None
        };

        match reason {
            Some(reason) => admission.rejected.push(Rejection {
                file_name: candidate.file_name,
                reason,
            }),
            None => {
                running += candidate.size;
                admission.accepted.push(candidate);
            }
        }
    }
    admission
}

/// Expand command-line paths into candidates.
///
/// Directories are walked recursively in file-name order and contribute only
/// files with an image extension; hidden entries are skipped. Explicit file
/// paths are always returned so that admission can report them.
pub fn read_candidates(paths: &[PathBuf]) -> Result<Vec<Candidate>, IntakeError> {
    let mut candidates = Vec::new();
    for path in paths {
        if path.is_dir() {
            let walker = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
            for entry in walker {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy();
                if entry.file_type().is_file() && content_type_for(&name).is_some() {
                    candidates.push(Candidate::from_path(entry.path())?);
                }
            }
        } else {
            candidates.push(Candidate::from_path(path)?);
        }
    }
    Ok(candidates)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Bytes as MiB with one decimal, e.g. `9.5 MB`.
pub fn format_mib(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;

    fn sized(name: &str, size: u64) -> Candidate {
        Candidate {
            file_name: name.into(),
            content_type: "image/jpeg".into(),
            size,
            source: CandidateSource::Memory(Bytes::new()),
        }
    }

    fn names(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.file_name.as_str()).collect()
    }

    // =========================================================================
    // admit tests
    // =========================================================================

    #[test]
    fn single_oversized_file_rejected() {
        let admission = admit(0, vec![sized("big.jpg", 12 * MIB)], &Limits::default());
        assert!(admission.accepted.is_empty());
        assert_eq!(
            admission.rejected[0].reason,
            RejectReason::FileTooLarge {
                size: 12 * MIB,
                limit: 10 * MIB
            }
        );
    }

    #[test]
    fn session_limit_is_cumulative_within_one_selection() {
        let candidates = (0..6).map(|i| sized(&format!("{i}.jpg"), 9 * MIB)).collect();
        let admission = admit(0, candidates, &Limits::default());

        assert_eq!(names(&admission.accepted), vec!["0.jpg", "1.jpg", "2.jpg", "3.jpg", "4.jpg"]);
        assert_eq!(admission.rejected.len(), 1);
        assert_eq!(admission.rejected[0].file_name, "5.jpg");
        assert!(matches!(
            admission.rejected[0].reason,
            RejectReason::SessionLimit { remaining, .. } if remaining == 5 * MIB
        ));
    }

    #[test]
    fn session_limit_counts_existing_items() {
        let admission = admit(45 * MIB, vec![sized("a.jpg", 6 * MIB), sized("b.jpg", 4 * MIB)], &Limits::default());
        assert_eq!(names(&admission.accepted), vec!["b.jpg"]);
        assert_eq!(admission.accepted_size(), 4 * MIB);
    }

    #[test]
    fn exact_limits_are_accepted() {
        let limits = Limits {
            max_file_size: 10,
            max_total_size: 20,
        };
        let admission = admit(0, vec![sized("a.jpg", 10), sized("b.jpg", 10)], &limits);
        assert_eq!(admission.accepted.len(), 2);
        assert!(admission.rejected.is_empty());
    }

    #[test]
    fn unsupported_type_rejected() {
        let candidate = Candidate::from_bytes("notes.txt", "text/plain", b"hi".to_vec());
        let admission = admit(0, vec![candidate], &Limits::default());
        assert_eq!(
            admission.rejected[0].reason,
            RejectReason::UnsupportedType("text/plain".into())
        );
    }

    #[test]
    fn rejection_message_names_file_and_sizes() {
        let rejection = Rejection {
            file_name: "big.jpg".into(),
            reason: RejectReason::FileTooLarge {
                size: 12 * MIB,
                limit: 10 * MIB,
            },
        };
        assert_eq!(
            rejection.to_string(),
            "big.jpg: 12.0 MB exceeds the 10.0 MB per-file limit"
        );
    }

    // =========================================================================
    // Candidate tests
    // =========================================================================

    #[test]
    fn from_path_reads_size_and_type() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Dawn.JPG");
        std::fs::write(&path, vec![0u8; 42]).unwrap();

        let candidate = Candidate::from_path(&path).unwrap();
        assert_eq!(candidate.file_name, "Dawn.JPG");
        assert_eq!(candidate.content_type, "image/jpeg");
        assert_eq!(candidate.size, 42);
    }

    #[test]
    fn from_path_unknown_extension_is_octet_stream() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "x").unwrap();
        assert_eq!(
            Candidate::from_path(&path).unwrap().content_type,
            FALLBACK_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn load_reads_file_into_item() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.png");
        std::fs::write(&path, b"pngbytes").unwrap();

        let item = Candidate::from_path(&path).unwrap().load().await.unwrap();
        assert_eq!(item.data.as_ref(), b"pngbytes");
        assert_eq!(item.content_type, "image/png");
        assert_eq!(item.preview, path.display().to_string());
        assert!(item.compressing);
    }

    #[tokio::test]
    async fn load_memory_candidate() {
        let item = Candidate::from_bytes("a.jpg", "image/jpeg", b"abc".to_vec())
            .load()
            .await
            .unwrap();
        assert_eq!(item.preview, "memory:a.jpg");
        assert_eq!(item.original_size, 3);
    }

    // =========================================================================
    // read_candidates tests
    // =========================================================================

    #[test]
    fn read_candidates_walks_directories_for_images() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("shoot/raw")).unwrap();
        std::fs::create_dir_all(tmp.path().join("shoot/.cache")).unwrap();
        std::fs::write(tmp.path().join("shoot/b.jpg"), "b").unwrap();
        std::fs::write(tmp.path().join("shoot/a.png"), "a").unwrap();
        std::fs::write(tmp.path().join("shoot/raw/c.webp"), "c").unwrap();
        std::fs::write(tmp.path().join("shoot/notes.txt"), "n").unwrap();
        std::fs::write(tmp.path().join("shoot/.cache/d.jpg"), "d").unwrap();

        let candidates = read_candidates(&[tmp.path().join("shoot")]).unwrap();
        assert_eq!(names(&candidates), vec!["a.png", "b.jpg", "c.webp"]);
    }

    #[test]
    fn read_candidates_keeps_explicit_files() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        std::fs::write(&txt, "n").unwrap();

        let candidates = read_candidates(&[txt]).unwrap();
        assert_eq!(names(&candidates), vec!["notes.txt"]);
    }

    #[test]
    fn read_candidates_missing_path_errors() {
        let tmp = TempDir::new().unwrap();
        let result = read_candidates(&[tmp.path().join("nope.jpg")]);
        assert!(matches!(result, Err(IntakeError::Io(_))));
    }
}
