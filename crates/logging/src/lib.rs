#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! # Overview
//!
//! `logging` owns the two output channels of the transfer engines:
//!
//! - `tracing` diagnostics, filtered through `RUST_LOG` and rendered to
//!   stderr by the subscriber that [`init`] installs.
//! - User-facing status lines, pushed through the [`EventSink`] trait. The
//!   engines emit exactly one line per event; the sink decides where it goes.
//!   [`ConsoleSink`] timestamps each line and prints it to stdout, which is
//!   also the seam a graphical front-end hooks its log view into.
//!
//! The byte formatter used in status lines lives here too so every surface
//! renders sizes the same way.

use std::io::{self, Write};
use std::sync::Once;

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};
use tracing_subscriber::EnvFilter;

/// Timestamp format prefixed to console status lines.
const STATUS_TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month padding:zero]-[day padding:zero] [hour padding:zero]:[minute padding:zero]:[second padding:zero]"
);

static INIT: Once = Once::new();

/// Installs the global tracing subscriber.
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`. Calling it more
/// than once is a no-op, so tests can call it freely.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    });
}

/// Receives one status line per transfer event.
///
/// Implementations must tolerate being called from the engine worker threads.
pub trait EventSink: Send + Sync {
    /// Delivers a single, unterminated status line.
    fn status(&self, line: &str);
}

/// Prints timestamped status lines to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn status(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "[{}] {line}", current_timestamp());
    }
}

/// Discards every status line. Useful for tests and for callers that only
/// consume counter snapshots.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn status(&self, _line: &str) {}
}

fn current_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(STATUS_TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "1970-01-01 00:00:00".to_owned())
}

/// Formats a byte count the way the original tool reported it: `bytes`, `kB`,
/// `MB`, `GB`, or `TB` with two fractional digits.
#[must_use]
pub fn human_bytes(size: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "kB", "MB", "GB", "TB"];

    if size == 0 {
        return "0 bytes".to_owned();
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{size} bytes")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
