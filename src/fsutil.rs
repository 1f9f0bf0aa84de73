//! File-system helpers shared by the batch engines: atomic writes, idempotent
//! directory creation, directory listing, and label/image pairing.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::RslabelError;

/// Extensions tried, in order, when a label's conventional image is missing.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "png", "jpeg", "bmp", "tif", "tiff"];

/// Writes `bytes` to `path` in full or not at all.
///
/// The data goes to a temporary file in the destination directory, which is
/// then renamed over `path`. A reader never sees a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RslabelError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir).map_err(|source| RslabelError::path_io(dir, source))?;
    temp.write_all(bytes)
        .and_then(|()| temp.flush())
        .map_err(|source| RslabelError::path_io(path, source))?;
    temp.persist(path)
        .map_err(|err| RslabelError::path_io(path, err.error))?;
    Ok(())
}

/// Creates `dir` and its parents if absent. Safe to race.
pub fn ensure_dir(dir: &Path) -> Result<(), RslabelError> {
    fs::create_dir_all(dir).map_err(|source| RslabelError::path_io(dir, source))
}

/// Lists the regular files directly inside `dir` whose extension is one of
/// `extensions` (case-insensitive), sorted by file name.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, RslabelError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| RslabelError::path_io(dir, io::Error::from(source)))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

/// One label file and the image it annotates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelPair {
    pub label_path: PathBuf,
    pub image_path: PathBuf,
}

/// Pairs every label in `labels_dir` with an image in `images_dir` that has
/// the same stem.
///
/// The image is `<stem>.<preferred_ext>` when that file exists; otherwise the
/// first existing [`IMAGE_EXTENSIONS`] match. When nothing exists the pair
/// still points at the preferred name, so the caller reports a missing image
/// only if it actually needs one.
pub fn label_pairs(
    images_dir: &Path,
    labels_dir: &Path,
    label_extension: &str,
    preferred_ext: &str,
) -> Result<Vec<LabelPair>, RslabelError> {
    let labels = list_files(labels_dir, &[label_extension])?;
    Ok(labels
        .into_iter()
        .map(|label_path| {
            let stem = label_path.file_stem().unwrap_or_default().to_os_string();
            let image_path = find_image(images_dir, &stem, preferred_ext);
            LabelPair {
                label_path,
                image_path,
            }
        })
        .collect())
}

/// The image named `stem` in `images_dir`, trying `preferred_ext` first.
///
/// Falls back to the preferred name when no candidate exists.
pub fn find_image(images_dir: &Path, stem: &OsStr, preferred_ext: &str) -> PathBuf {
    let preferred = file_in(images_dir, stem, preferred_ext);
    if preferred.is_file() {
        return preferred;
    }

    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| file_in(images_dir, stem, ext))
        .find(|candidate| candidate.is_file())
        .unwrap_or(preferred)
}

/// `<dir>/<stem>.<ext>`. Unlike `with_extension`, keeps dots inside `stem`.
pub fn file_in(dir: &Path, stem: &OsStr, ext: &str) -> PathBuf {
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(ext);
    dir.join(name)
}
