//! Upload workflow: archive in, attributed questions out.
//!
//! Batches are all-or-nothing. Every archive in a request is extracted
//! before anything is written, and the combined result is persisted in a
//! single transaction. A failing archive fails the whole request. Images
//! already published for earlier archives are not withdrawn.

use std::future::Future;
use std::path::{Path, PathBuf};

use quizbank_extractor::extract_questions;
use quizbank_shared::{
    AppConfig, ExtractedQuestion, ExtractorConfig, NewQuestion, QuizbankError, Result,
};
use quizbank_storage::Storage;
use tracing::{info, instrument};

use crate::archive::{extract_zip, find_document, find_images_dir};
use crate::images::{ArchiveImageResolver, ImageStore};
use crate::workspace::UploadWorkspace;

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One archive together with the grouping its questions are filed under.
#[derive(Debug, Clone)]
pub struct ArchiveUpload {
    pub file: UploadedFile,
    pub category: String,
    pub subject: String,
}

/// Zip parallel form lists into uploads. Lengths must agree and every file
/// must be a `.zip`; nothing is processed otherwise.
pub fn pair_uploads(
    files: Vec<UploadedFile>,
    categories: Vec<String>,
    subjects: Vec<String>,
) -> Result<Vec<ArchiveUpload>> {
    if files.len() != categories.len() || files.len() != subjects.len() {
        return Err(QuizbankError::invalid_input(
            "The number of files, categories, and subjects must match.",
        ));
    }
    for file in &files {
        ensure_zip(&file.file_name)?;
    }
    Ok(files
        .into_iter()
        .zip(categories)
        .zip(subjects)
        .map(|((file, category), subject)| ArchiveUpload {
            file,
            category,
            subject,
        })
        .collect())
}

fn ensure_zip(file_name: &str) -> Result<()> {
    if file_name.to_ascii_lowercase().ends_with(".zip") {
        Ok(())
    } else {
        Err(QuizbankError::invalid_input(format!(
            "Invalid file type: {file_name}. Please upload ZIP files."
        )))
    }
}

/// Where finished questions go.
pub trait QuestionSink: Send + Sync {
    fn persist(&self, questions: &[NewQuestion]) -> impl Future<Output = Result<Vec<i64>>> + Send;
}

impl QuestionSink for Storage {
    async fn persist(&self, questions: &[NewQuestion]) -> Result<Vec<i64>> {
        self.insert_questions(questions).await
    }
}

/// Drives archives through extraction with an injected image store.
#[derive(Debug)]
pub struct Ingestor<S> {
    store: S,
    work_dir: PathBuf,
    extractor: ExtractorConfig,
    key_prefix: String,
}

impl<S: ImageStore> Ingestor<S> {
    pub fn new(
        store: S,
        work_dir: impl Into<PathBuf>,
        extractor: ExtractorConfig,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            work_dir: work_dir.into(),
            extractor,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_config(store: S, config: &AppConfig) -> Self {
        Self::new(
            store,
            &config.server.work_dir,
            config.extractor.clone(),
            &config.images.key_prefix,
        )
    }

    /// Unpack one archive and extract its questions. Scratch files are gone
    /// by the time this returns.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn extract_archive(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Vec<ExtractedQuestion>> {
        let workspace = UploadWorkspace::create(&self.work_dir, file_name, bytes).await?;

        let archive_path = workspace.archive_path().to_path_buf();
        let extract_dir = workspace.extract_dir().to_path_buf();
        let archive_name = file_name.to_string();
        let extension = self.extractor.document_extension.clone();

        let unpacked = tokio::task::spawn_blocking(move || {
            unpack(&archive_path, &extract_dir, &archive_name, &extension)
        })
        .await
        .map_err(|e| QuizbankError::Internal(format!("archive task failed: {e}")))??;

        if let Some(images) = &unpacked.images_dir {
            info!(images = %images.display(), "archive has an images directory");
        }
        let html = unpacked.html;

        let resolver = ArchiveImageResolver::new(workspace.extract_dir(), &self.store, &self.key_prefix);
        let questions = extract_questions(&html, &self.extractor, &resolver).await?;

        info!(questions = questions.len(), "extracted archive");
        Ok(questions)
    }

    /// Extract one archive and attribute its questions to `owner`.
    pub async fn ingest_archive(&self, upload: &ArchiveUpload, owner: i64) -> Result<Vec<NewQuestion>> {
        ensure_zip(&upload.file.file_name)?;
        let extracted = self
            .extract_archive(&upload.file.file_name, &upload.file.bytes)
            .await?;
        Ok(extracted
            .into_iter()
            .map(|q| NewQuestion::new(q, &upload.category, &upload.subject, owner))
            .collect())
    }

    /// Extract archives in order. The first failure aborts the batch.
    #[instrument(skip(self, uploads), fields(archives = uploads.len()))]
    pub async fn ingest_batch(&self, uploads: &[ArchiveUpload], owner: i64) -> Result<Vec<NewQuestion>> {
        let mut all = Vec::new();
        for upload in uploads {
            all.extend(self.ingest_archive(upload, owner).await?);
        }
        Ok(all)
    }

    /// Extract the batch, then persist it in one write.
    pub async fn upload_and_store<K: QuestionSink>(
        &self,
        uploads: &[ArchiveUpload],
        owner: i64,
        sink: &K,
    ) -> Result<Vec<NewQuestion>> {
        let questions = self.ingest_batch(uploads, owner).await?;
        let ids = sink.persist(&questions).await?;
        info!(stored = ids.len(), owner, "stored uploaded questions");
        Ok(questions)
    }
}

/// An unpacked archive: the decoded document and its images directory, if any.
#[derive(Debug)]
struct UnpackedArchive {
    html: String,
    images_dir: Option<PathBuf>,
}

/// Blocking half of [`Ingestor::extract_archive`].
fn unpack(
    archive_path: &Path,
    extract_dir: &Path,
    archive_name: &str,
    extension: &str,
) -> Result<UnpackedArchive> {
    extract_zip(archive_path, extract_dir, archive_name)?;
    let images_dir = find_images_dir(extract_dir)?;
    let document = find_document(extract_dir, extension, archive_name)?;
    let raw = std::fs::read(&document).map_err(|e| QuizbankError::io(&document, e))?;
    Ok(UnpackedArchive {
        html: String::from_utf8_lossy(&raw).into_owned(),
        images_dir,
    })
}
