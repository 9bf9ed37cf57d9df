//! Resolver Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A resolver error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The store rejected an operation even after retries.
    #[display("media store error")]
    Store,
    /// A content fingerprint could not be computed.
    #[display("failed to fingerprint file")]
    Hash,
    /// A download directory could not be walked.
    #[display("failed to scan download directory")]
    Scan,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Retries against the store happen inside the resolver; by the time an
    /// error reaches a caller it is final.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
