//! Perceptual image fingerprinting.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use image::ImageReader;
use image_hasher::{HashAlg, HasherConfig};
use std::path::Path;

/// Hash dimensions. 16x16 keeps re-encodes of the same frame on the same
/// value while still separating visually distinct images.
const HASH_SIZE: u32 = 16;

/// Computes a perceptual content fingerprint for a raster image.
///
/// Two-phase: the image is first opened and fully decoded to prove it is
/// valid, then reopened for the hashing pass. A single decoder handle
/// cannot safely serve both, so the reopen is deliberate.
///
/// # Errors
///
/// [`ErrorKind::ImageOpen`], [`ErrorKind::ImageVerify`] or
/// [`ErrorKind::ImageHash`] depending on which phase failed.
pub fn fingerprint(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let reader = ImageReader::open(path).or_raise(|| ErrorKind::ImageOpen(path.to_path_buf()))?;
    reader
        .with_guessed_format()
        .or_raise(|| ErrorKind::ImageOpen(path.to_path_buf()))?
        .decode()
        .or_raise(|| ErrorKind::ImageVerify(path.to_path_buf()))?;

    let image = image::open(path).or_raise(|| ErrorKind::ImageHash(path.to_path_buf()))?;
    let hasher = HasherConfig::new()
        .hash_size(HASH_SIZE, HASH_SIZE)
        .hash_alg(HashAlg::DoubleGradient)
        .to_hasher();
    // Hex instead of base64: fingerprints end up embedded in `hash2`
    // filename tags, which only admit hex.
    Ok(hex::encode(hasher.hash_image(&image).as_bytes()))
}
