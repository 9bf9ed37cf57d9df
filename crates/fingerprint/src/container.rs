//! Selective container hashing.
//!
//! Only a policy-selected subset of box payloads is digested, so the result
//! is stable across metadata-only edits. Two selection policies exist:
//!
//! - [`HashMode::Standard`] digests `ftyp` + `mdat`: the structural header
//!   and the actual media payload. Index/metadata boxes (`moov`, `free`)
//!   are excluded because authoring tools rewrite them without altering the
//!   decodable content.
//! - [`HashMode::Legacy`] digests `ftyp` + `free`. This reproduces the
//!   digests an earlier version of the tool stored, and exists purely for
//!   identity continuity with those records. It is a historical quirk, not
//!   a content-correctness signal; never prefer it for new data.

use crate::boxes::{BoxWalker, MediaBox};
use crate::error::{ErrorKind, Result};
use md5::Digest;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Payloads are streamed into the digest in bounded chunks so memory use is
/// O(chunk) regardless of box size.
const CHUNK_SIZE: u64 = 1024 * 1024;

/// Which set of box payloads participates in the digest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashMode {
    /// `ftyp` + `mdat`: stable across non-destructive metadata edits.
    Standard,
    /// `ftyp` + `free`: bug-compatible with previously stored digests.
    Legacy,
}

impl HashMode {
    fn selects(self, fourcc: [u8; 4]) -> bool {
        match self {
            Self::Standard => matches!(&fourcc, b"ftyp" | b"mdat"),
            Self::Legacy => matches!(&fourcc, b"ftyp" | b"free"),
        }
    }
}

/// Hashes the selected box payloads of the container at `path`.
///
/// Returns the lowercase hex digest. Deterministic: identical input bytes
/// and an identical `mode` always produce an identical digest.
///
/// # Errors
///
/// [`ErrorKind::NotFound`] when the path cannot be opened;
/// [`ErrorKind::Format`] for malformed containers, including streams under
/// 8 bytes and streams whose first box is not `ftyp`.
pub fn hash_container<D: Digest>(path: impl AsRef<Path>, mode: HashMode) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| open_error(e, path))?;
    let mut walker = BoxWalker::new(BufReader::new(file))?;
    let mut digest = D::new();
    while let Some(bx) = walker.next_box()? {
        if mode.selects(bx.fourcc) {
            digest_payload(&mut walker, &bx, &mut digest)?;
        }
    }
    Ok(hex::encode(digest.finalize()))
}

fn open_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            ErrorKind::NotFound(path.to_path_buf())
        }
        _ => ErrorKind::Io(e),
    }
}

fn digest_payload<R, D>(walker: &mut BoxWalker<R>, bx: &MediaBox, digest: &mut D) -> Result<()>
where
    R: Read + Seek,
    D: Digest,
{
    if bx.payload_size == 0 {
        return Ok(());
    }
    let reader = walker.get_mut();
    reader.seek(SeekFrom::Start(bx.payload_offset)).map_err(ErrorKind::Io)?;
    let mut buffer = vec![0u8; bx.payload_size.min(CHUNK_SIZE) as usize];
    let mut remaining = bx.payload_size;
    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE) as usize;
        reader.read_exact(&mut buffer[..want]).map_err(ErrorKind::Io)?;
        digest.update(&buffer[..want]);
        remaining -= want as u64;
    }
    Ok(())
}
