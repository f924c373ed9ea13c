//! Scratch space for one uploaded archive.
//!
//! An [`UploadWorkspace`] owns the raw upload saved to disk and the directory
//! it is extracted into. Both are removed when the guard is dropped, whether
//! processing succeeded or not.

use std::path::{Path, PathBuf};

use quizbank_shared::{QuizbankError, Result};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct UploadWorkspace {
    archive_path: PathBuf,
    extract_dir: PathBuf,
}

impl UploadWorkspace {
    /// Save `bytes` under `work_dir` and reserve a unique extraction directory.
    pub async fn create(work_dir: &Path, archive_name: &str, bytes: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| QuizbankError::io(work_dir, e))?;

        let safe_name = sanitize(archive_name);
        let stem = safe_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&safe_name);
        let id = Uuid::now_v7();

        let workspace = Self {
            archive_path: work_dir.join(format!("uploaded_{id}_{safe_name}")),
            extract_dir: work_dir.join(format!("extracted_{stem}_{id}")),
        };

        // The guard exists before the write so a failed write is cleaned up too.
        tokio::fs::write(&workspace.archive_path, bytes)
            .await
            .map_err(|e| QuizbankError::io(&workspace.archive_path, e))?;
        debug!(
            archive = %workspace.archive_path.display(),
            bytes = bytes.len(),
            "saved upload"
        );
        Ok(workspace)
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }
}

impl Drop for UploadWorkspace {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.archive_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!(path = %self.archive_path.display(), error = %e, "failed to remove upload");
            }
            _ => {}
        }
        match std::fs::remove_dir_all(&self.extract_dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!(path = %self.extract_dir.display(), error = %e, "failed to remove extraction dir");
            }
            _ => {}
        }
    }
}

/// Keep only the final path component and replace anything that is not
/// alphanumeric, `.`, `-` or `_`.
fn sanitize(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload.zip".into()
    } else {
        cleaned
    }
}
