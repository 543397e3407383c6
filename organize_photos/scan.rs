//! Recursive enumeration of the photos of the source tree

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context as _, bail};
use common::{has_extension_in, quote_path};
use walkdir::{DirEntry, WalkDir};

pub const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "heic", "heif", "raw", "cr2", "nef", "arw",
    "dng",
];

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub modified: SystemTime,
}

/// Photos under `source_root`, recursively, sorted by name within each directory. `excluded`
/// (the destination, when it lies inside the source) is not entered. Symlinks to files are
/// followed, symlinks to directories are not.
pub fn scan<'a>(
    source_root: &'a Path,
    excluded: Option<&'a Path>,
) -> impl Iterator<Item = anyhow::Result<ScannedFile>> + 'a {
    WalkDir::new(source_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| excluded.is_none_or(|excluded| entry.path() != excluded))
        .filter_map(move |entry_or_err| match entry_or_err {
            Ok(entry) => is_photo_candidate(&entry).then(|| to_scanned_file(source_root, &entry)),
            Err(error) => Some(Err(error).context("failed to walk the source directory")),
        })
}

fn is_photo_candidate(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    (file_type.is_file() || file_type.is_symlink())
        && has_extension_in(entry.path(), PHOTO_EXTENSIONS)
}

fn to_scanned_file(source_root: &Path, entry: &DirEntry) -> anyhow::Result<ScannedFile> {
    let path = entry.path();
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to read metadata from {}", quote_path(path)))?;
    if !metadata.is_file() {
        bail!("{} is not a file", quote_path(path));
    }
    let modified = metadata
        .modified()
        .with_context(|| format!("failed to read the modification time of {}", quote_path(path)))?;
    let relative_path = path.strip_prefix(source_root).unwrap_or(path).to_owned();
    Ok(ScannedFile { path: path.to_owned(), relative_path, modified })
}
