//! Bridges a receiver-reported name collision to a user decision.
//!
//! The sender blocks inside [`ConflictResolver::resolve`] until a decision
//! exists; the two implementations differ only in where the question goes.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use logging::human_bytes;

use crate::stats::SentCounters;

/// The three ways a name collision can be settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Replace the receiver's copy.
    Overwrite,
    /// Store the incoming file under a free sibling name.
    KeepBoth,
    /// Abandon this file.
    Skip,
}

/// The collision being decided: the wire path plus both sides' sizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictRequest {
    /// Relative path as announced on the wire.
    pub relative_path: String,
    /// Size of the receiver's existing copy.
    pub remote_size: u64,
    /// Size of the local source file.
    pub local_size: u64,
}

/// Answers conflict questions on behalf of the front-end.
pub trait ConflictResolver: Send + Sync {
    /// Blocks until the user settles `request`.
    ///
    /// Implementations return [`ConflictChoice::Skip`] once the sender's
    /// canceled flag is set so a cancellation never hangs on an unanswered
    /// question.
    fn resolve(&self, request: &ConflictRequest) -> ConflictChoice;
}

/// Prompts on the controlling terminal and reads a one-letter answer.
pub struct ConsoleResolver {
    counters: Arc<SentCounters>,
}

impl ConsoleResolver {
    /// Creates a resolver that honours the batch's canceled flag.
    #[must_use]
    pub fn new(counters: Arc<SentCounters>) -> Self {
        Self { counters }
    }

    fn prompt(request: &ConflictRequest) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(
            stdout,
            "'{}' already exists on the receiver ({} there, {} here).",
            request.relative_path,
            human_bytes(request.remote_size),
            human_bytes(request.local_size),
        );
        let _ = writeln!(stdout, "  [O]verwrite  [B] keep both  [S]kip");
        let _ = write!(stdout, "Choice: ");
        let _ = stdout.flush();
    }
}

impl ConflictResolver for ConsoleResolver {
    fn resolve(&self, request: &ConflictRequest) -> ConflictChoice {
        let stdin = io::stdin();
        loop {
            if self.counters.is_canceled() {
                return ConflictChoice::Skip;
            }
            Self::prompt(request);

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                // EOF: nobody is attached to answer.
                Ok(0) => return ConflictChoice::Skip,
                Ok(_) => {}
                Err(_) => return ConflictChoice::Skip,
            }
            match line.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
                Some('O') => return ConflictChoice::Overwrite,
                Some('B') => return ConflictChoice::KeepBoth,
                Some('S') => return ConflictChoice::Skip,
                _ => {}
            }
        }
    }
}

/// Publishes the conflict to the shared slot and polls for the answer.
///
/// This is the bridge a graphical front-end uses: it observes
/// [`SentCounters::pending_conflict`], raises its dialog, and writes the
/// answer back with [`SentCounters::answer_conflict`].
pub struct SlotResolver {
    counters: Arc<SentCounters>,
    poll_interval: Duration,
}

impl SlotResolver {
    /// Poll cadence for the pending answer; comfortably above 3 Hz.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Creates a resolver polling at the default cadence.
    #[must_use]
    pub fn new(counters: Arc<SentCounters>) -> Self {
        Self::with_poll_interval(counters, Self::DEFAULT_POLL_INTERVAL)
    }

    /// Creates a resolver with an explicit poll cadence (mostly for tests).
    #[must_use]
    pub fn with_poll_interval(counters: Arc<SentCounters>, poll_interval: Duration) -> Self {
        Self {
            counters,
            poll_interval,
        }
    }
}

impl ConflictResolver for SlotResolver {
    fn resolve(&self, request: &ConflictRequest) -> ConflictChoice {
        self.counters.post_conflict(request.clone());
        loop {
            if let Some(choice) = self.counters.take_conflict_answer() {
                return choice;
            }
            if self.counters.is_canceled() {
                self.counters.clear_conflict();
                return ConflictChoice::Skip;
            }
            thread::sleep(self.poll_interval);
        }
    }
}
