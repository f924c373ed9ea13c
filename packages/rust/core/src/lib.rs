//! Core workflows for quizbank.
//!
//! This crate ties the extractor and storage together:
//! - [`archive`]: unpacking uploads and locating documents and images
//! - [`workspace`]: per-upload scratch files, removed on drop
//! - [`images`]: image stores (S3, local directory) and the archive resolver
//! - [`ingest`]: the upload workflow, from archive bytes to stored questions
//! - [`auth`]: registration, login, and bearer token checks

pub mod archive;
pub mod auth;
pub mod images;
pub mod ingest;
pub mod workspace;

pub use auth::AuthService;
pub use images::{ImageBackend, ImageStore, LocalImageStore, S3ImageStore};
pub use ingest::{ArchiveUpload, Ingestor, QuestionSink, UploadedFile, pair_uploads};
