//! SQLite store for media identity records.
//!
//! This crate owns the narrow persistence surface the identity resolver
//! reconciles against: media records (one per upstream media id) and the
//! account rows they reference. The upstream metadata sync is the source of
//! truth for everything else; this store only tracks what the dedup engine
//! needs — content hashes, local filenames and the downloaded flag.
//!
//! Writes against an embedded SQLite file can hit transient lock
//! contention. [`RetryPolicy`] wraps repository calls with a bounded,
//! linear backoff that retries only the retryable [`error::ErrorKind`]; a
//! persistent failure is re-raised unchanged.

mod db;
pub mod error;
pub mod models;
mod repo;
mod retry;

pub use crate::db::Database;
pub use crate::repo::Repository;
pub use crate::retry::RetryPolicy;
