//! Identity token extraction.

use regex::Regex;
use std::sync::LazyLock;

static HASH2: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_hash2_([0-9a-fA-F]+)").unwrap());
// `_hash_` (generation 0) and `_hash1_` (generation 1). The optional `1`
// keeps `_hash2_` from matching here.
static LEGACY_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_hash1?_([0-9a-fA-F]+)").unwrap());
static MEDIA_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(preview_)?id_(\d+)").unwrap());

/// A numeric media id embedded in a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaId {
    /// Upstream media id.
    pub id: i64,
    /// The file is a preview variant, not the full media.
    pub preview: bool,
}

/// Extracts the current-generation `hash2` tag value.
pub fn extract_hash2(filename: &str) -> Option<&str> {
    HASH2.captures(filename).map(|caps| caps.get(1).unwrap().as_str())
}

/// Extracts a legacy (`hash`/`hash1`) tag value.
///
/// Legacy tags identify a file for lookup against historically stored
/// digests; they are never re-written.
pub fn extract_legacy_hash(filename: &str) -> Option<&str> {
    LEGACY_HASH.captures(filename).map(|caps| caps.get(1).unwrap().as_str())
}

/// Extracts an embedded numeric media id, noting a `preview_` marker.
///
/// Ids that overflow `i64` are treated as absent rather than truncated.
pub fn extract_media_id(filename: &str) -> Option<MediaId> {
    let caps = MEDIA_ID.captures(filename)?;
    let id = caps.get(2).unwrap().as_str().parse::<i64>().ok()?;
    Some(MediaId { id, preview: caps.get(1).is_some() })
}

/// Appends the canonical `_hash2_<hex>` tag ahead of the extension, making
/// a freshly hashed file self-identifying on the next scan.
pub fn tag_with_hash2(filename: &str, digest: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_hash2_{digest}.{ext}"),
        None => format!("{filename}_hash2_{digest}"),
    }
}
