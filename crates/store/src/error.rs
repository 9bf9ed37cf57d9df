//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong
/// internally: `Locked` is worth retrying, everything else is not.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The store reported lock contention; a short backoff may clear it.
    #[display("store is locked")]
    Locked,
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// Stored data that does not convert to a domain model.
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked)
    }
}
