//! Filename identity grammar and timestamp normalization.
//!
//! Prior downloads embedded identity tokens directly into filenames. Four
//! idioms are recognized:
//!
//! - `..._hash_<hex>` — legacy tag generation 0, read-only
//! - `..._hash1_<hex>` — legacy tag generation 1, read-only
//! - `..._hash2_<hex>` — the current content-hash tag
//! - `..._[preview_]id_<digits>` — the upstream numeric media id
//!
//! A hash tag always takes precedence over an id token: a hash-tagged file
//! is fully identified and is never re-hashed. The legacy tags are
//! recognized when reading existing trees but are never re-emitted; only
//! `hash2` is ever written.

mod tags;
mod timestamp;

pub use crate::tags::{MediaId, extract_hash2, extract_legacy_hash, extract_media_id, tag_with_hash2};
pub use crate::timestamp::normalize_timestamp;
