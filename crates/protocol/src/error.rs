use std::io;

use thiserror::Error;

use crate::token::ControlToken;

/// Errors raised while encoding or decoding the transfer dialogue.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the connection in the middle of a frame.
    #[error("connection closed mid-frame")]
    Truncated,
    /// A token frame carried bytes that match no known control token.
    #[error("unknown control token {0:?}")]
    UnknownToken(String),
    /// A known token arrived where the dialogue does not allow it.
    #[error("unexpected control token {0}")]
    UnexpectedToken(ControlToken),
    /// A length prefix exceeded the bound for its frame kind.
    #[error("frame of {len} bytes exceeds the {limit}-byte limit")]
    FrameTooLong {
        /// Length announced by the peer.
        len: u32,
        /// Maximum length accepted for this frame kind.
        limit: u32,
    },
    /// The header carried a path that is empty or not valid UTF-8.
    #[error("invalid path in header: {0}")]
    InvalidPath(String),
    /// The underlying socket failed.
    #[error("socket error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}

impl ProtocolError {
    /// Returns `true` when the error indicates the peer broke the framing
    /// contract rather than the transport failing.
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownToken(_)
                | Self::UnexpectedToken(_)
                | Self::FrameTooLong { .. }
                | Self::InvalidPath(_)
        )
    }
}
