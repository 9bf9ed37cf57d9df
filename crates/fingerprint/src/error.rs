//! Fingerprinting Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A fingerprinting error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fingerprinting operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The three image kinds are kept distinct so the resolver can log which
/// phase failed instead of silently hashing a corrupt file.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The container structure is too broken to walk.
    #[display("malformed container: {_0}")]
    Format(#[error(not(source))] String),
    /// The file vanished or could not be opened at hash time.
    #[display("file not found or unreadable: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The image file could not be opened at all.
    #[display("failed to open image: {}", _0.display())]
    ImageOpen(#[error(not(source))] PathBuf),
    /// The image opened but does not decode.
    #[display("image failed verification: {}", _0.display())]
    ImageVerify(#[error(not(source))] PathBuf),
    /// The image verified but the perceptual hash pass failed.
    #[display("failed to hash image: {}", _0.display())]
    ImageHash(#[error(not(source))] PathBuf),
    #[display("i/o error while reading media")]
    Io(std::io::Error),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A malformed file stays malformed; nothing here is transient.
        false
    }
}
