//! Identity resolution between downloaded media files and the store.
//!
//! A download directory accumulates files named by three generations of
//! conventions: hash-tagged, id-tagged and bare. Reconciliation walks the
//! directory once, classifies every file by its strongest identity marker
//! and matches it against the store, hashing content only when the name
//! alone cannot settle it. Downloads are checked for duplicate content
//! before being recorded at all.

pub mod classify;
pub mod error;
pub mod hashing;
mod resolver;

pub use crate::classify::{Classification, ClassifiedFile, classify_filename, scan_directory};
pub use crate::hashing::fingerprint_for;
pub use crate::resolver::{Config, Context, ReconcileReport, Resolution, Resolver};
