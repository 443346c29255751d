#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! # Overview
//!
//! `checksums` provides the CRC-32 digests used by the resume handshake. The
//! polynomial is the IEEE one (zlib-compatible), so a digest computed here
//! matches what any zlib-based peer produces for the same bytes.
//!
//! The receiver hashes its whole local copy; the sender hashes only the first
//! `length` bytes of its source, where `length` is the receiver's announced
//! size. Equal digests over that common prefix make it safe to append the
//! remainder.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crc32fast::Hasher;

/// Buffer length used when streaming a file through the hasher.
pub const READER_BUFFER_LEN: usize = 32 * 1024;

/// Computes the CRC-32 of a byte slice.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Computes the CRC-32 of an entire file, streaming it in
/// [`READER_BUFFER_LEN`] chunks.
pub fn file_crc32(path: &Path) -> io::Result<u32> {
    let mut reader = BufReader::with_capacity(READER_BUFFER_LEN, File::open(path)?);
    let mut hasher = Hasher::new();
    let mut buf = [0u8; READER_BUFFER_LEN];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finalize())
}

/// Computes the CRC-32 of the first `length` bytes of a file.
///
/// A file shorter than `length` contributes only the bytes it has, matching
/// the sender side of the resume handshake where the announced prefix is
/// never larger than the source.
pub fn file_prefix_crc32(path: &Path, length: u64) -> io::Result<u32> {
    let mut reader = BufReader::with_capacity(READER_BUFFER_LEN, File::open(path)?);
    let mut hasher = Hasher::new();
    let mut buf = [0u8; READER_BUFFER_LEN];
    let mut remaining = length;
    while remaining > 0 {
        let want = usize::try_from(remaining.min(READER_BUFFER_LEN as u64))
            .unwrap_or(READER_BUFFER_LEN);
        let read = reader.read(&mut buf[..want])?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        remaining -= read as u64;
    }
    Ok(hasher.finalize())
}
