//! Archive stage: unpacking uploaded ZIP bundles and locating files inside them.
//!
//! All lookups walk the tree in a fixed order: entries of a directory sorted
//! by name, the directory's files before its subdirectories, subdirectories
//! descended depth-first. "First match" always means first in that order.

use std::fs::File;
use std::path::{Path, PathBuf};

use quizbank_shared::{QuizbankError, Result};
use tracing::{debug, instrument};

/// One node produced by [`walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl WalkEntry {
    fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Unpack `zip_path` into `dest`. `archive_name` is only used for error messages.
#[instrument(skip_all, fields(archive = archive_name))]
pub fn extract_zip(zip_path: &Path, dest: &Path, archive_name: &str) -> Result<()> {
    let file = File::open(zip_path).map_err(|e| QuizbankError::io(zip_path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| QuizbankError::archive(archive_name, e.to_string()))?;

    debug!(entries = archive.len(), dest = %dest.display(), "extracting archive");
    archive
        .extract(dest)
        .map_err(|e| QuizbankError::archive(archive_name, e.to_string()))
}

/// List everything under `root` in walk order. Symlinks are skipped.
pub fn walk(root: &Path) -> Result<Vec<WalkEntry>> {
    let mut out = Vec::new();
    walk_into(root, &mut out)?;
    Ok(out)
}

fn walk_into(dir: &Path, out: &mut Vec<WalkEntry>) -> Result<()> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(|e| QuizbankError::io(dir, e))? {
        let entry = entry.map_err(|e| QuizbankError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| QuizbankError::io(entry.path(), e))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    dirs.sort();

    out.extend(files.into_iter().map(|path| WalkEntry {
        path,
        is_dir: false,
    }));
    out.extend(dirs.iter().map(|path| WalkEntry {
        path: path.clone(),
        is_dir: true,
    }));
    for sub in &dirs {
        walk_into(sub, out)?;
    }
    Ok(())
}

/// First file whose name ends with `.<extension>`.
pub fn find_document(root: &Path, extension: &str, archive_name: &str) -> Result<PathBuf> {
    let suffix = format!(".{extension}");
    walk(root)?
        .into_iter()
        .find(|e| !e.is_dir && e.name().ends_with(&suffix))
        .map(|e| e.path)
        .ok_or_else(|| QuizbankError::DocumentNotFound {
            archive: archive_name.to_string(),
        })
}

/// First directory called `images`, ignoring case.
pub fn find_images_dir(root: &Path) -> Result<Option<PathBuf>> {
    Ok(walk(root)?
        .into_iter()
        .find(|e| e.is_dir && e.name().eq_ignore_ascii_case("images"))
        .map(|e| e.path))
}

/// First file whose name is exactly `name`.
pub fn find_file_by_name(root: &Path, name: &str) -> Result<Option<PathBuf>> {
    Ok(walk(root)?
        .into_iter()
        .find(|e| !e.is_dir && e.name() == name)
        .map(|e| e.path))
}

/// The last `/`- or `\`-separated segment of an image reference.
pub fn base_name(src: &str) -> &str {
    src.rsplit(['/', '\\']).next().unwrap_or(src)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use uuid::Uuid;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("qb-{tag}-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel.as_bytes()).unwrap();
    }

    #[test]
    fn walk_order_is_files_then_sorted_subdirs() {
        let root = temp_dir("walk");
        touch(&root, "b.txt");
        touch(&root, "a.txt");
        touch(&root, "z/inner.txt");
        touch(&root, "m/deep/x.txt");

        let names: Vec<String> = walk(&root)
            .unwrap()
            .iter()
            .map(|e| e.path.strip_prefix(&root).unwrap().display().to_string())
            .collect();
        assert_eq!(
            names,
            ["a.txt", "b.txt", "m", "z", "m/deep", "m/deep/x.txt", "z/inner.txt"]
        );
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn finds_document_and_images_dir() {
        let root = temp_dir("find");
        touch(&root, "bundle/Quiz.html");
        touch(&root, "bundle/IMAGES/image1.png");
        touch(&root, "readme.txt");

        let doc = find_document(&root, "html", "quiz.zip").unwrap();
        assert!(doc.ends_with("bundle/Quiz.html"));

        let images = find_images_dir(&root).unwrap().expect("images dir");
        assert!(images.ends_with("bundle/IMAGES"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_document_is_reported() {
        let root = temp_dir("nodoc");
        touch(&root, "images/a.png");
        let err = find_document(&root, "html", "quiz.zip").unwrap_err();
        assert!(matches!(err, QuizbankError::DocumentNotFound { .. }));
        assert!(err.to_string().contains("quiz.zip"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn duplicate_basenames_resolve_to_first_in_walk() {
        let root = temp_dir("dup");
        touch(&root, "b/fig.png");
        touch(&root, "a/fig.png");

        let found = find_file_by_name(&root, "fig.png").unwrap().unwrap();
        assert!(found.ends_with("a/fig.png"));
        assert!(find_file_by_name(&root, "nope.png").unwrap().is_none());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("images/image1.png"), "image1.png");
        assert_eq!(base_name("..\\media\\x.jpg"), "x.jpg");
        assert_eq!(base_name("plain.gif"), "plain.gif");
    }

    #[test]
    fn extracts_zip_and_rejects_garbage() {
        let root = temp_dir("zip");
        let zip_path = root.join("quiz.zip");
        {
            let mut writer = zip::ZipWriter::new(File::create(&zip_path).unwrap());
            writer
                .start_file("quiz/index.html", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<p class=\"c1\">1. Q</p>").unwrap();
            writer.finish().unwrap();
        }

        let dest = root.join("out");
        extract_zip(&zip_path, &dest, "quiz.zip").expect("extract");
        assert!(dest.join("quiz/index.html").is_file());

        let junk = root.join("junk.zip");
        std::fs::write(&junk, b"definitely not a zip").unwrap();
        let err = extract_zip(&junk, &root.join("junk"), "junk.zip").unwrap_err();
        assert!(matches!(err, QuizbankError::Archive { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }
}
