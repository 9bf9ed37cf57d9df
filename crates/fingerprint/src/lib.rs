//! Content fingerprinting for downloaded media files.
//!
//! A fingerprint is a deterministic digest over a *defined subset* of a
//! file's bytes, used as a proxy for "this is the same content". Two kinds
//! are produced here:
//!
//! - **Container digests** ([`hash_container`]): ISO-BMFF (MP4/M4A) files
//!   are walked box by box and only a policy-selected set of box payloads is
//!   fed into the digest. Metadata boxes that authoring tools rewrite
//!   without touching the decodable content are deliberately excluded, so
//!   the digest survives non-destructive edits.
//! - **Perceptual image hashes** ([`fingerprint`]): raster images are
//!   reduced to a fixed-width gradient hash so re-encodes of the same frame
//!   land on the same value.
//!
//! Fingerprint equality implies equality of the selected bytes only, never
//! full-file byte equality.

pub mod boxes;
pub mod container;
pub mod error;
pub mod perceptual;

pub use crate::boxes::{BoxWalker, MediaBox};
pub use crate::container::{HashMode, hash_container};
pub use crate::perceptual::fingerprint;
