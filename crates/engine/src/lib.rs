#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! # Overview
//!
//! `engine` is the transfer core: the per-file sender state machine, the
//! per-connection receiver state machine, and the shared counter records both
//! of them update while observers poll snapshots.
//!
//! Every file travels over its own TCP connection. The sender announces a
//! relative path and size, the receiver answers with one control token
//! (accept, reject, request a prefix checksum, or flag a conflict), the two
//! sides settle on a disposition, and then raw bytes flow until the sender
//! closes its write side.
//!
//! # Concurrency
//!
//! The sender drains its request list one file at a time on the calling
//! thread. The receiver owns the listening socket and handles each accepted
//! connection inline; the accept loop polls a non-blocking listener so the
//! cancellation flag is observed within a bounded tick. Counter fields each
//! have a single writer, so observers read relaxed snapshots without locks;
//! only the cancellation flags, the overwrite policy, and the conflict slot
//! cross threads the other way.

pub mod conflict;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod walk;

mod error;

pub use conflict::{ConflictChoice, ConflictRequest, ConflictResolver, ConsoleResolver, SlotResolver};
pub use error::{RecvError, SendError};
pub use receiver::{Receiver, ReceiverConfig};
pub use sender::{SendOutcome, Sender, TransferRequest};
pub use stats::{ReceivedCounters, ReceivedSnapshot, SentCounters, SentSnapshot};
