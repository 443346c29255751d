use std::io;
use std::path::PathBuf;

use protocol::ProtocolError;
use thiserror::Error;

/// Errors that fail a single outgoing file.
///
/// All of them are fatal for the file and recoverable for the batch; the
/// sender records the failure and moves on to the next request.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiver could not be reached.
    #[error("could not establish connection: {0}")]
    Connect(#[source] io::Error),
    /// The local source file could not be read.
    #[error("could not read source file: {0}")]
    Source(#[source] io::Error),
    /// The connection dropped while streaming bytes.
    #[error("connection lost: {0}")]
    Transport(#[source] io::Error),
    /// The receiver refused the file.
    #[error("file rejected by receiver")]
    Rejected,
    /// The user canceled the batch mid-transfer.
    #[error("user canceled transfer")]
    Canceled,
    /// The user chose to skip the file after a conflict.
    #[error("file skipped after conflict")]
    Skipped,
    /// The control dialogue failed or was violated.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors that fail a single incoming connection.
///
/// None of them stop the accept loop.
#[derive(Debug, Error)]
pub enum RecvError {
    /// The service port could not be bound.
    #[error("could not bind service port: {0}")]
    Bind(#[source] io::Error),
    /// The connection dropped while reading file bytes.
    #[error("connection lost: {0}")]
    Transport(#[source] io::Error),
    /// The target file could not be created or written.
    #[error("could not write '{path}': {source}")]
    TargetUnwritable {
        /// Path that failed.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// The user canceled while bytes were arriving.
    #[error("user canceled transfer")]
    Canceled,
    /// The header or control dialogue failed or was violated.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
