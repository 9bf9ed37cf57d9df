//! Dispatch from mimetype to the right content fingerprint.

use keepsake_fingerprint::{HashMode, hash_container, perceptual};
use md5::Md5;
use std::path::Path;

/// Compute the content fingerprint for a file, picking the algorithm by
/// mimetype.
///
/// Images get a perceptual fingerprint so re-encodes of the same picture
/// still match; video and audio get the selective container digest, which
/// ignores mutable metadata boxes. Anything else is not fingerprintable
/// and yields `Ok(None)`.
pub fn fingerprint_for(path: impl AsRef<Path>, mimetype: &str) -> keepsake_fingerprint::error::Result<Option<String>> {
    match mimetype.split('/').next() {
        Some("image") => perceptual::fingerprint(path).map(Some),
        Some("video" | "audio") => hash_container::<Md5>(path, HashMode::Standard).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_fingerprint::error::ErrorKind;

    #[test]
    fn test_image_gets_perceptual_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * 4) as u8, (y * 4) as u8, 0]))
            .save(&path)
            .unwrap();
        let hash = fingerprint_for(&path, "image/png").unwrap().unwrap();
        assert!(!hash.is_empty());
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_video_gets_container_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(b"isomiso2");
        data.extend_from_slice(&12u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(b"abcd");
        std::fs::write(&path, &data).unwrap();
        let hash = fingerprint_for(&path, "video/mp4").unwrap().unwrap();
        assert_eq!(hash.len(), 32, "md5 digest is 16 bytes hex encoded");
    }

    #[test]
    fn test_other_mimetypes_are_not_fingerprintable() {
        assert!(fingerprint_for("whatever.txt", "text/plain").unwrap().is_none());
        assert!(fingerprint_for("whatever.bin", "application/octet-stream").unwrap().is_none());
    }

    #[test]
    fn test_video_format_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.mp4");
        std::fs::write(&path, b"1234567").unwrap();
        let err = fingerprint_for(&path, "video/mp4").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }
}
