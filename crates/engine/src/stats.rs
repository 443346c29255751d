//! Shared counter records for the two transfer directions.
//!
//! Each record has one writing engine; observers poll [`SentCounters::snapshot`]
//! or [`ReceivedCounters::snapshot`] and tolerate staleness, so every field
//! uses relaxed atomics. The exceptions that cross threads the other way are
//! the cancellation flags, the overwrite policy, and the conflict slot.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::conflict::{ConflictChoice, ConflictRequest};

/// Counters written by the sender engine.
#[derive(Debug, Default)]
pub struct SentCounters {
    bytes_sent: AtomicU64,
    processed_files: AtomicU64,
    failed_files: AtomicU64,
    canceled: AtomicBool,
    conflict: Mutex<ConflictSlot>,
}

/// Point-in-time view of [`SentCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SentSnapshot {
    /// Cumulative bytes written to sockets across the batch.
    pub bytes_sent: u64,
    /// Files that reached a terminal state, successful or not.
    pub processed_files: u64,
    /// Files that ended in failure.
    pub failed_files: u64,
    /// Whether cancellation has been requested.
    pub canceled: bool,
}

#[derive(Debug, Default)]
struct ConflictSlot {
    pending: Option<ConflictRequest>,
    response: Option<ConflictChoice>,
}

impl SentCounters {
    /// Creates a zeroed record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds streamed bytes to the running total.
    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a file that completed successfully.
    pub fn record_success(&self) {
        self.processed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file that ended in failure.
    pub fn record_failure(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
        self.processed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests cancellation of the in-flight batch.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// Zeroes the counters and clears the cancellation flag for a new batch.
    pub fn reset(&self) {
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.processed_files.store(0, Ordering::Relaxed);
        self.failed_files.store(0, Ordering::Relaxed);
        self.canceled.store(false, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy for observers.
    pub fn snapshot(&self) -> SentSnapshot {
        SentSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            processed_files: self.processed_files.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
            canceled: self.is_canceled(),
        }
    }

    /// Publishes a conflict that needs a user decision.
    ///
    /// The slot holds one conflict at a time: it is written once per conflict
    /// and cleared before the next one can be posted.
    pub fn post_conflict(&self, request: ConflictRequest) {
        let mut slot = self.conflict.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.pending = Some(request);
        slot.response = None;
    }

    /// Returns the conflict currently awaiting an answer, if any.
    ///
    /// This is the observer side of the hand-off; a front-end polls it and
    /// raises its dialogue when it turns `Some`.
    pub fn pending_conflict(&self) -> Option<ConflictRequest> {
        let slot = self.conflict.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.response.is_none().then(|| slot.pending.clone()).flatten()
    }

    /// Stores the user's answer for the pending conflict.
    pub fn answer_conflict(&self, choice: ConflictChoice) {
        let mut slot = self.conflict.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.pending.is_some() {
            slot.response = Some(choice);
        }
    }

    /// Consumes the answer and clears the slot for the next conflict.
    pub fn take_conflict_answer(&self) -> Option<ConflictChoice> {
        let mut slot = self.conflict.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let choice = slot.response.take()?;
        slot.pending = None;
        Some(choice)
    }

    /// Drops a posted conflict without an answer (cancellation path).
    pub fn clear_conflict(&self) {
        let mut slot = self.conflict.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.pending = None;
        slot.response = None;
    }
}

/// Counters written by the receiver engine.
#[derive(Debug, Default)]
pub struct ReceivedCounters {
    received_files: AtomicU64,
    rejected_files: AtomicU64,
    failed_files: AtomicU64,
    data_received: AtomicU64,
    overwrite: AtomicBool,
    in_progress: AtomicBool,
    canceled: AtomicBool,
}

/// Point-in-time view of [`ReceivedCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceivedSnapshot {
    /// Files written to completion.
    pub received_files: u64,
    /// Files turned away (identical copies, refused overwrites, unsafe paths).
    pub rejected_files: u64,
    /// Connections that ended in failure.
    pub failed_files: u64,
    /// Cumulative bytes written to disk.
    pub data_received: u64,
    /// Whether existing files may be overwritten.
    pub overwrite: bool,
    /// Whether a transfer is being written right now.
    pub in_progress: bool,
    /// Whether cancellation has been requested.
    pub canceled: bool,
}

impl ReceivedCounters {
    /// Creates a zeroed record with overwriting disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a file written to completion.
    pub fn record_received(&self) {
        self.received_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file that was turned away.
    pub fn record_rejected(&self) {
        self.rejected_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection that ended in failure.
    pub fn record_failed(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds bytes written to disk to the running total.
    pub fn add_data(&self, bytes: u64) {
        self.data_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Sets whether existing files may be overwritten. Writable by the
    /// front-end at any time.
    pub fn set_overwrite(&self, allowed: bool) {
        self.overwrite.store(allowed, Ordering::Relaxed);
    }

    /// Whether existing files may be overwritten.
    pub fn overwrite(&self) -> bool {
        self.overwrite.load(Ordering::Relaxed)
    }

    /// Marks a transfer as in flight (or not).
    pub fn set_in_progress(&self, active: bool) {
        self.in_progress.store(active, Ordering::Relaxed);
    }

    /// Whether a transfer is being written right now.
    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }

    /// Requests shutdown of the accept loop and any in-flight write.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// Zeroes the counters and clears the cancellation flag. The overwrite
    /// policy is sticky; it belongs to the front-end.
    pub fn reset(&self) {
        self.received_files.store(0, Ordering::Relaxed);
        self.rejected_files.store(0, Ordering::Relaxed);
        self.failed_files.store(0, Ordering::Relaxed);
        self.data_received.store(0, Ordering::Relaxed);
        self.canceled.store(false, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy for observers.
    pub fn snapshot(&self) -> ReceivedSnapshot {
        ReceivedSnapshot {
            received_files: self.received_files.load(Ordering::Relaxed),
            rejected_files: self.rejected_files.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
            data_received: self.data_received.load(Ordering::Relaxed),
            overwrite: self.overwrite(),
            in_progress: self.in_progress(),
            canceled: self.is_canceled(),
        }
    }
}
