//! Lazy ISO-BMFF box walking.
//!
//! An ISO-BMFF container is a flat sequence of boxes (atoms), each prefixed
//! by a 4-byte big-endian size and a 4-byte type code. A declared size of
//! `1` marks a "wide" box whose real size follows as an 8-byte big-endian
//! integer; a declared size of `0` extends the box to the end of the stream
//! and is only legal on the last box.
//!
//! The walker reads headers only. It never buffers payload bytes, and after
//! each [`BoxWalker::next_box`] the stream is positioned at the start of
//! that box's payload so a caller can selectively read it.

use crate::error::{ErrorKind, Result};
use std::io::{Read, Seek, SeekFrom};

/// Plain box header: 32-bit size plus fourcc.
const HEADER_SIZE: u64 = 8;
/// Header of a wide box: plain header plus the 64-bit size field.
const WIDE_HEADER_SIZE: u64 = 16;
/// A declared 32-bit size of 1 signals a wide box.
const WIDE_MARKER: u32 = 1;

/// A single box header, produced per parse pass.
///
/// Invariant: `position + size` of box *n* equals the `position` of box
/// *n + 1*, and the first box of a valid stream is always `ftyp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaBox {
    /// Absolute offset of the box header in the stream.
    pub position: u64,
    /// Four-character type code.
    pub fourcc: [u8; 4],
    /// Total box size including its header.
    pub size: u64,
    /// Absolute offset of the first payload byte.
    pub payload_offset: u64,
    /// Payload length (size minus header length).
    pub payload_size: u64,
}

impl MediaBox {
    /// The fourcc as printable text, for logs and diagnostics.
    pub fn fourcc_str(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).into_owned()
    }
}

/// Lazy, finite, non-restartable walk over the boxes of a seekable stream.
#[derive(Debug)]
pub struct BoxWalker<R> {
    reader: R,
    stream_len: u64,
    next_position: u64,
    first: bool,
}

impl<R: Read + Seek> BoxWalker<R> {
    /// Wraps a seekable stream. Fails immediately when the stream cannot
    /// hold even a single box header.
    pub fn new(mut reader: R) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0)).map_err(ErrorKind::Io)?;
        if stream_len < HEADER_SIZE {
            exn::bail!(ErrorKind::Format(format!(
                "stream is {stream_len} bytes; a container needs at least {HEADER_SIZE}"
            )));
        }
        Ok(Self {
            reader,
            stream_len,
            next_position: 0,
            first: true,
        })
    }

    /// Total length of the underlying stream in bytes.
    pub fn stream_len(&self) -> u64 {
        self.stream_len
    }

    /// Access to the underlying stream, positioned at the payload of the
    /// most recently returned box. Callers may read or seek freely; the
    /// walker re-seeks before parsing the next header.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Advances to the next box header, or `None` at end-of-stream.
    pub fn next_box(&mut self) -> Result<Option<MediaBox>> {
        let position = self.next_position;
        if position >= self.stream_len {
            return Ok(None);
        }
        if self.stream_len - position < HEADER_SIZE {
            exn::bail!(ErrorKind::Format(format!(
                "truncated box header at offset {position}"
            )));
        }
        self.reader.seek(SeekFrom::Start(position)).map_err(ErrorKind::Io)?;

        let mut header = [0u8; 8];
        self.reader.read_exact(&mut header).map_err(ErrorKind::Io)?;
        let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let fourcc = [header[4], header[5], header[6], header[7]];

        if self.first && &fourcc != b"ftyp" {
            exn::bail!(ErrorKind::Format(format!(
                "first box is `{}`, expected `ftyp`",
                String::from_utf8_lossy(&fourcc)
            )));
        }
        self.first = false;

        let (size, header_len) = match declared {
            0 => (self.stream_len - position, HEADER_SIZE),
            WIDE_MARKER => {
                if self.stream_len - position < WIDE_HEADER_SIZE {
                    exn::bail!(ErrorKind::Format(format!(
                        "truncated wide box header at offset {position}"
                    )));
                }
                let mut wide = [0u8; 8];
                self.reader.read_exact(&mut wide).map_err(ErrorKind::Io)?;
                (u64::from_be_bytes(wide), WIDE_HEADER_SIZE)
            }
            n => (u64::from(n), HEADER_SIZE),
        };

        if size < header_len {
            exn::bail!(ErrorKind::Format(format!(
                "box `{}` declares {size} bytes, smaller than its own {header_len}-byte header",
                String::from_utf8_lossy(&fourcc)
            )));
        }
        let end = position.checked_add(size).ok_or_else(|| {
            exn::Exn::from(ErrorKind::Format(format!(
                "box `{}` size overflows the address space",
                String::from_utf8_lossy(&fourcc)
            )))
        })?;
        if end > self.stream_len {
            exn::bail!(ErrorKind::Format(format!(
                "box `{}` at offset {position} overruns end of stream",
                String::from_utf8_lossy(&fourcc)
            )));
        }

        self.next_position = end;
        Ok(Some(MediaBox {
            position,
            fourcc,
            size,
            payload_offset: position + header_len,
            payload_size: size - header_len,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn plain_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
        out.extend_from_slice(fourcc);
        out.extend_from_slice(payload);
        out
    }

    fn wide_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(fourcc);
        out.extend_from_slice(&(16 + payload.len() as u64).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn walk_all(bytes: Vec<u8>) -> Vec<MediaBox> {
        let mut walker = BoxWalker::new(Cursor::new(bytes)).unwrap();
        let mut boxes = Vec::new();
        while let Some(bx) = walker.next_box().unwrap() {
            boxes.push(bx);
        }
        boxes
    }

    #[test]
    fn test_positions_cover_stream() {
        let mut bytes = plain_box(b"ftyp", &[0xAA; 16]);
        bytes.extend(plain_box(b"free", &[0xBB; 8]));
        bytes.extend(plain_box(b"mdat", &[0xCC; 8]));
        let len = bytes.len() as u64;

        let boxes = walk_all(bytes);
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[0].position, 0);
        for pair in boxes.windows(2) {
            assert_eq!(pair[0].position + pair[0].size, pair[1].position);
        }
        let last = boxes.last().unwrap();
        assert_eq!(last.position + last.size, len);
    }

    #[test]
    fn test_wide_box_size() {
        let mut bytes = plain_box(b"ftyp", &[0xAA; 16]);
        bytes.extend(wide_box(b"mdat", &[0xCC; 32]));
        let len = bytes.len() as u64;

        let boxes = walk_all(bytes);
        assert_eq!(boxes[1].fourcc, *b"mdat");
        assert_eq!(boxes[1].size, 16 + 32);
        assert_eq!(boxes[1].payload_offset, boxes[1].position + 16);
        assert_eq!(boxes[1].payload_size, 32);
        assert_eq!(boxes[1].position + boxes[1].size, len);
    }

    #[test]
    fn test_zero_size_extends_to_end_of_stream() {
        let mut bytes = plain_box(b"ftyp", &[0xAA; 16]);
        let mdat_start = bytes.len() as u64;
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(b"mdat");
        bytes.extend_from_slice(&[0xCC; 100]);
        let len = bytes.len() as u64;

        let boxes = walk_all(bytes);
        assert_eq!(boxes[1].position, mdat_start);
        assert_eq!(boxes[1].size, len - mdat_start);
        assert_eq!(boxes[1].payload_size, 100);
    }

    #[test]
    fn test_stream_shorter_than_a_header_is_rejected() {
        let err = BoxWalker::new(Cursor::new(vec![0u8; 7])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[test]
    fn test_first_box_must_be_ftyp() {
        let bytes = plain_box(b"moov", &[0u8; 8]);
        let mut walker = BoxWalker::new(Cursor::new(bytes)).unwrap();
        let err = walker.next_box().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[test]
    fn test_box_smaller_than_header_is_rejected() {
        let mut bytes = plain_box(b"ftyp", &[]);
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(b"free");
        let mut walker = BoxWalker::new(Cursor::new(bytes)).unwrap();
        walker.next_box().unwrap();
        let err = walker.next_box().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[test]
    fn test_box_overrunning_stream_is_rejected() {
        let mut bytes = plain_box(b"ftyp", &[]);
        bytes.extend(plain_box(b"mdat", &[0xCC; 8]));
        bytes.truncate(bytes.len() - 4);
        let mut walker = BoxWalker::new(Cursor::new(bytes)).unwrap();
        walker.next_box().unwrap();
        let err = walker.next_box().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[test]
    fn test_stream_positioned_at_payload() {
        let mut bytes = plain_box(b"ftyp", b"isom....");
        bytes.extend(plain_box(b"mdat", b"payload!"));
        let mut walker = BoxWalker::new(Cursor::new(bytes)).unwrap();
        let bx = walker.next_box().unwrap().unwrap();
        assert_eq!(bx.fourcc_str(), "ftyp");
        let mut payload = vec![0u8; bx.payload_size as usize];
        walker.get_mut().read_exact(&mut payload).unwrap();
        assert_eq!(payload, b"isom....");
        // Reading the payload must not confuse the walker.
        let bx = walker.next_box().unwrap().unwrap();
        assert_eq!(bx.fourcc_str(), "mdat");
    }
}
