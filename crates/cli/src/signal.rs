//! Ctrl-C wiring for the long-running commands.
//!
//! The handler only flips a flag; a watcher thread forwards the request to
//! the engine's cancellation flag so shutdown stays cooperative and bounded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

const WATCH_TICK: Duration = Duration::from_millis(200);

pub(crate) fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

#[cfg(unix)]
#[allow(unsafe_code)]
pub(crate) fn install() {
    extern "C" fn handle_sigint(_signal: libc::c_int) {
        INTERRUPTED.store(true, Ordering::Relaxed);
    }

    let handler = handle_sigint as extern "C" fn(libc::c_int);
    // The handler is async-signal-safe: it performs a single atomic store.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub(crate) fn install() {}

/// Spawns a watcher that invokes `cancel` once Ctrl-C arrives. The thread
/// lives until the signal fires or the process exits.
pub(crate) fn propagate_to(cancel: impl Fn() + Send + 'static) {
    thread::spawn(move || {
        loop {
            if interrupted() {
                cancel();
                return;
            }
            thread::sleep(WATCH_TICK);
        }
    });
}
