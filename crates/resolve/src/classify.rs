//! Classification of downloaded files by filename identity markers.

use keepsake_filename::{extract_hash2, extract_legacy_hash, extract_media_id};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use exn::ResultExt;

use crate::error::{ErrorKind, Result};

/// How a file's name identifies it, in decreasing order of reliability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The filename embeds a content hash tag; identity is self-evident.
    Hash2(String),
    /// The filename embeds an upstream media id.
    MediaId { id: i64, preview: bool },
    /// No identity marker; the content must be hashed to resolve it.
    NeedsHash,
}

/// A file found under the download root, ready for resolution.
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub path: PathBuf,
    pub filename: String,
    pub mimetype: String,
    pub classification: Classification,
}

/// Classify a filename by its embedded identity markers.
///
/// Hash tags outrank id tags: a hash pins content identity exactly, while
/// an id only names the upstream record. Legacy `_hash_`/`_hash1_` tags
/// land in the same bucket as `_hash2_`; they still identify a file for
/// lookup against stored digests but are never written to new filenames.
pub fn classify_filename(filename: &str) -> Classification {
    if let Some(hash) = extract_hash2(filename) {
        return Classification::Hash2(hash.to_string());
    }
    if let Some(hash) = extract_legacy_hash(filename) {
        return Classification::Hash2(hash.to_string());
    }
    if let Some(media_id) = extract_media_id(filename) {
        return Classification::MediaId { id: media_id.id, preview: media_id.preview };
    }
    Classification::NeedsHash
}

/// Walk the download root and classify every regular file in it.
///
/// Files with non-UTF-8 names cannot carry any of the identity markers and
/// are skipped with a warning. Results are ordered hash-tagged first, then
/// id-tagged, then unmarked, so the cheapest resolutions run before any
/// hashing starts.
pub fn scan_directory(root: impl AsRef<Path>) -> Result<Vec<ClassifiedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root.as_ref()) {
        let entry = entry.or_raise(|| ErrorKind::Scan)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str() else {
            warn!(path = %entry.path().display(), "skipping file with non-UTF-8 name");
            continue;
        };
        let mimetype = mime_guess::from_path(entry.path())
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        files.push(ClassifiedFile {
            path: entry.path().to_path_buf(),
            filename: filename.to_string(),
            mimetype,
            classification: classify_filename(filename),
        });
    }
    files.sort_by_key(|file| match &file.classification {
        Classification::Hash2(_) => 0u8,
        Classification::MediaId { .. } => 1,
        Classification::NeedsHash => 2,
    });
    Ok(files)
}
