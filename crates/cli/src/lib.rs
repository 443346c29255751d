#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! # Overview
//!
//! `cli` is the command-line frontend. It parses the `send`, `receive`, and
//! `discover` subcommands, wires the engines to the console sink and the
//! console conflict prompt, and maps outcomes to exit codes:
//!
//! - `0` — normal shutdown / every file succeeded
//! - `1` — at least one file failed, or a command could not start
//! - `2` — argument error

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

pub mod settings;

mod args;
mod commands;
mod signal;

pub use args::{DiscoverArgs, Invocation, ReceiveArgs, SendArgs};

/// Every file succeeded, or the receiver shut down normally.
pub const EXIT_OK: i32 = 0;
/// At least one file failed, or the command could not start.
pub const EXIT_FAILURE: i32 = 1;
/// Invalid command-line arguments.
pub const EXIT_USAGE: i32 = 2;

/// Parses `args` and runs the selected subcommand.
///
/// Returns the process exit status; convert it with [`exit_code_from`].
pub fn run<I, Out, Err>(args: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
    Out: Write,
    Err: Write,
{
    logging::init();

    match args::parse(args) {
        Ok(Invocation::Send(send_args)) => commands::send(send_args, stdout, stderr),
        Ok(Invocation::Receive(receive_args)) => commands::receive(receive_args, stdout, stderr),
        Ok(Invocation::Discover(discover_args)) => {
            commands::discover(discover_args, stdout, stderr)
        }
        Err(error) => {
            let rendered = error.render();
            if error.use_stderr() {
                let _ = write!(stderr, "{rendered}");
            } else {
                // --help and --version land here and exit successfully.
                let _ = write!(stdout, "{rendered}");
            }
            error.exit_code()
        }
    }
}

/// Maps a status from [`run`] onto a [`std::process::ExitCode`].
#[must_use]
pub fn exit_code_from(status: i32) -> ExitCode {
    ExitCode::from(u8::try_from(status).unwrap_or(u8::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_two() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = run(["lancp", "send"], &mut stdout, &mut stderr);
        assert_eq!(status, EXIT_USAGE);
        assert!(!stderr.is_empty());
    }

    #[test]
    fn help_exits_zero_and_prints_to_stdout() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = run(["lancp", "--help"], &mut stdout, &mut stderr);
        assert_eq!(status, EXIT_OK);
        assert!(!stdout.is_empty());
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_codes_map_into_process_codes() {
        assert_eq!(exit_code_from(EXIT_OK), ExitCode::from(0));
        assert_eq!(exit_code_from(EXIT_FAILURE), ExitCode::from(1));
        assert_eq!(exit_code_from(EXIT_USAGE), ExitCode::from(2));
    }
}
