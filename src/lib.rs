//! # Studio Gallery
//!
//! Client-gallery intake for a photography studio. The owner creates a gallery
//! for a client, selects image files, and the pipeline compresses them,
//! uploads them in bounded parallel batches, and records each image in the
//! gallery's document. The client later opens the gallery by its id and gets
//! the ordered images with time-bounded URLs.
//!
//! # Architecture: Intake Pipeline
//!
//! ```text
//! 1. Admit      files     →  UploadSession      (per-file and per-session size caps)
//! 2. Compress   items     →  smaller payloads   (bounded longer edge, rayon pool)
//! 3. Create     owner form →  GalleryRecord      (empty image list, fresh id)
//! 4. Upload     items     →  ObjectStore        (batches of N, append per completed file)
//! 5. View       id        →  GalleryView        (point read, parallel URL resolution)
//! ```
//!
//! Hosted services sit behind traits ([`store::ObjectStore`],
//! [`store::DocumentStore`], [`auth::AuthProvider`], [`telemetry::Telemetry`]).
//! The crate ships in-memory and filesystem adapters, so the whole pipeline
//! runs locally and in tests without any hosted service.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`intake`] | Admission control and reading selected files |
//! | [`compress`] | Pre-upload downscale and re-encode, with fallback to the original |
//! | [`imaging`] | Pure-Rust image operations behind the `ImageBackend` trait |
//! | [`upload`] | `UploadSession` and the batched `UploadBatcher` |
//! | [`gallery`] | Gallery records, search, deletion, and the client email |
//! | [`viewer`] | Client view states with eager/lazy loading hints |
//! | [`render`] | Client page HTML using Maud |
//! | [`store`] | Object and document store traits plus local adapters |
//! | [`auth`] | Owner sign-in for admin commands |
//! | [`telemetry`] | Fire-and-forget named events |
//! | [`config`] | `studio.toml` loading, validation, and merging |
//! | [`types`] | Upload items and the persisted gallery documents |
//! | [`naming`] | Storage paths, share links, and content types |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Sessions
//!
//! The gallery id produced by creation is stored on the [`upload::UploadSession`]
//! that created it and reused by every retry. A retry never creates a second
//! gallery and never rewrites the record it already has.
//!
//! ## Append, Never Rewrite
//!
//! Completed uploads are recorded through [`store::DocumentStore::append_image`],
//! which each store implements atomically. Concurrent completions inside a
//! batch therefore cannot lose entries, and the final image count equals the
//! number of successful uploads whatever order they finished in.
//!
//! ## Compression Never Fails an Upload
//!
//! A file that cannot be decoded, or that would not get smaller, is uploaded
//! as it was selected. Compression is an optimisation, not a gate.

pub mod auth;
pub mod compress;
pub mod config;
pub mod gallery;
pub mod imaging;
pub mod intake;
pub mod naming;
pub mod output;
pub mod render;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod upload;
pub mod viewer;

#[cfg(test)]
pub(crate) mod test_helpers;
