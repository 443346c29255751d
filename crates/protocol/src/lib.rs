#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! # Overview
//!
//! `protocol` defines the wire format spoken between a `lancp` sender and
//! receiver. Every transfer uses one TCP connection per file and starts with a
//! fixed header (path length, path bytes, declared size) followed by a short
//! control dialogue of length-prefixed tokens, then the raw file bytes until
//! the sender closes its write side.
//!
//! # Design
//!
//! - [`token`] holds the nine control tokens as opaque magic strings. Their
//!   byte values are the protocol; they are compared case-sensitively.
//! - [`frame`] implements the framing primitives: `u32`/`u64` little-endian
//!   integers, length-prefixed token frames, and the file header. Reads are
//!   bounded so a hostile length prefix cannot force a large allocation.
//! - [`path`] normalises received relative paths to the local separator
//!   convention and joins them safely under the save directory. Paths are
//!   converted on receipt, never on send, so the wire stays sender-native.
//!
//! # Errors
//!
//! [`ProtocolError`] distinguishes a truncated peer ([`ProtocolError::Truncated`]),
//! an unknown or oversized frame (a protocol violation), and ordinary socket
//! failures, so the engines can account for them separately.

pub mod frame;
pub mod path;
pub mod token;

mod error;

pub use error::ProtocolError;
pub use frame::{CHUNK_SIZE, FileHeader, MAX_PATH_LEN, MAX_TOKEN_LEN};
pub use token::ControlToken;
