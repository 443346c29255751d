//! Control tokens exchanged during the per-file dialogue.
//!
//! The token values are opaque magic strings inherited from the wire format;
//! both sides compare them byte-for-byte.

use std::fmt;

/// A control token sent inside a length-prefixed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlToken {
    /// Receiver accepts the file as announced; sender may stream.
    AllGood,
    /// Receiver refuses the file; the sender records a failure.
    Rejected,
    /// Receiver requests a prefix CRC-32; followed by its local size.
    ReqCrc32,
    /// Prefix checksums matched; sender streams from the receiver's size.
    Resume,
    /// Both sides hold an identical file; nothing is transferred.
    SameCopy,
    /// Files differ; followed by the receiver's local size. The sender must
    /// answer with one of the three decision tokens.
    DiffFile,
    /// Sender asks to replace the receiver's copy.
    ReqOverwrite,
    /// Sender asks the receiver to store the file under a free sibling name.
    KeepBoth,
    /// Sender abandons this file after a conflict.
    SkipFile,
}

impl ControlToken {
    /// Every token, in wire-table order.
    pub const ALL: [Self; 9] = [
        Self::AllGood,
        Self::Rejected,
        Self::ReqCrc32,
        Self::Resume,
        Self::SameCopy,
        Self::DiffFile,
        Self::ReqOverwrite,
        Self::KeepBoth,
        Self::SkipFile,
    ];

    /// Returns the exact UTF-8 string transmitted for this token.
    #[must_use]
    pub const fn wire(self) -> &'static str {
        match self {
            Self::AllGood => "0xB00B1E5",
            Self::Rejected => "0xD6EC7ED",
            Self::ReqCrc32 => "AC710271BE",
            Self::Resume => "0x7E50BE",
            Self::SameCopy => "0x5ABEC097",
            Self::DiffFile => "0xD1FFF1113",
            Self::ReqOverwrite => "0x0B37717E",
            Self::KeepBoth => "0x4EE9B074",
            Self::SkipFile => "0x5419F111E",
        }
    }

    /// Maps received frame bytes back to a token, or `None` for unknown data.
    #[must_use]
    pub fn from_wire(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|token| token.wire() == text)
    }
}

impl fmt::Display for ControlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}
