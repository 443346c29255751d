//! Framing primitives for the transfer dialogue.
//!
//! All integers on the wire are little-endian. Control tokens and the header
//! path travel inside `u32`-length-prefixed frames; the declared file size,
//! the negotiated local size, and the prefix CRC-32 are bare fixed-width
//! integers.

use std::io::{self, Read, Write};

use crate::error::ProtocolError;
use crate::token::ControlToken;

/// Chunk size used when streaming file bytes in either direction.
pub const CHUNK_SIZE: usize = 4096;

/// Upper bound for a token frame's announced length.
pub const MAX_TOKEN_LEN: u32 = 32;

/// Upper bound for the header path's announced length, in bytes.
pub const MAX_PATH_LEN: u32 = 4096;

/// The fixed header opening every per-file connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHeader {
    /// Relative path in the sender's native separator convention.
    pub relative_path: String,
    /// The sender's view of the file length at connection time. Used only to
    /// drive the resume decision, never trusted for allocation.
    pub declared_size: u64,
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), ProtocolError> {
    reader.read_exact(buf).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated
        } else {
            ProtocolError::Io(error)
        }
    })
}

/// Reads a little-endian `u32`.
pub fn read_u32(reader: &mut impl Read) -> Result<u32, ProtocolError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads a little-endian `u64`.
pub fn read_u64(reader: &mut impl Read) -> Result<u64, ProtocolError> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Writes a little-endian `u32`.
pub fn write_u32(writer: &mut impl Write, value: u32) -> Result<(), ProtocolError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Writes a little-endian `u64`.
pub fn write_u64(writer: &mut impl Write, value: u64) -> Result<(), ProtocolError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Reads one length-prefixed frame, bounded by `limit`.
fn read_frame(reader: &mut impl Read, limit: u32) -> Result<Vec<u8>, ProtocolError> {
    let len = read_u32(reader)?;
    if len > limit {
        return Err(ProtocolError::FrameTooLong { len, limit });
    }
    let mut bytes = vec![0u8; len as usize];
    read_exact(reader, &mut bytes)?;
    Ok(bytes)
}

/// Reads the next control token frame.
pub fn read_token(reader: &mut impl Read) -> Result<ControlToken, ProtocolError> {
    let bytes = read_frame(reader, MAX_TOKEN_LEN)?;
    let text = String::from_utf8_lossy(&bytes);
    ControlToken::from_wire(&text)
        .ok_or_else(|| ProtocolError::UnknownToken(text.into_owned()))
}

/// Writes a control token inside a length-prefixed frame.
pub fn write_token(writer: &mut impl Write, token: ControlToken) -> Result<(), ProtocolError> {
    let bytes = token.wire().as_bytes();
    write_u32(writer, bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads the file header that opens a transfer connection.
pub fn read_header(reader: &mut impl Read) -> Result<FileHeader, ProtocolError> {
    let bytes = read_frame(reader, MAX_PATH_LEN)?;
    if bytes.is_empty() {
        return Err(ProtocolError::InvalidPath("empty path".to_owned()));
    }
    let relative_path = String::from_utf8(bytes)
        .map_err(|_| ProtocolError::InvalidPath("path is not valid UTF-8".to_owned()))?;
    let declared_size = read_u64(reader)?;
    Ok(FileHeader {
        relative_path,
        declared_size,
    })
}

/// Writes the file header that opens a transfer connection.
pub fn write_header(
    writer: &mut impl Write,
    relative_path: &str,
    declared_size: u64,
) -> Result<(), ProtocolError> {
    let bytes = relative_path.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_PATH_LEN as usize {
        return Err(ProtocolError::InvalidPath(relative_path.to_owned()));
    }
    write_u32(writer, bytes.len() as u32)?;
    writer.write_all(bytes)?;
    write_u64(writer, declared_size)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn integers_round_trip_little_endian() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0xDEAD_BEEF).unwrap();
        write_u64(&mut buf, u64::MAX - 7).unwrap();
        assert_eq!(&buf[..4], &0xDEAD_BEEFu32.to_le_bytes());

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_u64(&mut cursor).unwrap(), u64::MAX - 7);
    }

    #[test]
    fn token_frames_round_trip() {
        for token in ControlToken::ALL {
            let mut buf = Vec::new();
            write_token(&mut buf, token).unwrap();
            let mut cursor = Cursor::new(buf);
            assert_eq!(read_token(&mut cursor).unwrap(), token);
        }
    }

    #[test]
    fn unknown_token_is_a_violation() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 5).unwrap();
        buf.extend_from_slice(b"bogus");
        let error = read_token(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(error, ProtocolError::UnknownToken(ref text) if text == "bogus"));
        assert!(error.is_violation());
    }

    #[test]
    fn oversized_token_frame_is_bounded() {
        let mut buf = Vec::new();
        write_u32(&mut buf, u32::MAX).unwrap();
        let error = read_token(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(
            error,
            ProtocolError::FrameTooLong {
                len: u32::MAX,
                limit: MAX_TOKEN_LEN,
            }
        ));
    }

    #[test]
    fn header_round_trips() {
        let mut buf = Vec::new();
        write_header(&mut buf, "photos/2024/cat.jpg", 123_456).unwrap();
        let header = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(header.relative_path, "photos/2024/cat.jpg");
        assert_eq!(header.declared_size, 123_456);
    }

    #[test]
    fn header_keeps_sender_native_separators() {
        let mut buf = Vec::new();
        write_header(&mut buf, "docs\\report.txt", 9).unwrap();
        let header = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(header.relative_path, "docs\\report.txt");
    }

    #[test]
    fn truncated_header_is_detected() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 10).unwrap();
        buf.extend_from_slice(b"short");
        let error = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(error, ProtocolError::Truncated));
    }

    #[test]
    fn header_missing_size_is_truncated() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 4).unwrap();
        buf.extend_from_slice(b"file");
        let error = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(error, ProtocolError::Truncated));
    }

    #[test]
    fn empty_path_is_rejected_both_ways() {
        let mut buf = Vec::new();
        assert!(matches!(
            write_header(&mut buf, "", 0),
            Err(ProtocolError::InvalidPath(_))
        ));

        let mut encoded = Vec::new();
        write_u32(&mut encoded, 0).unwrap();
        write_u64(&mut encoded, 0).unwrap();
        assert!(matches!(
            read_header(&mut Cursor::new(encoded)),
            Err(ProtocolError::InvalidPath(_))
        ));
    }
}
