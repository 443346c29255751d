//! Argument definitions and parsing for the three subcommands.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgGroup, Command, value_parser};

use crate::settings::DEFAULT_SETTINGS_FILE;

/// A fully parsed invocation.
#[derive(Clone, Debug)]
pub enum Invocation {
    /// `lancp send`
    Send(SendArgs),
    /// `lancp receive`
    Receive(ReceiveArgs),
    /// `lancp discover`
    Discover(DiscoverArgs),
}

/// Arguments for `lancp send`.
#[derive(Clone, Debug)]
pub struct SendArgs {
    /// Receiver host name or address.
    pub host: String,
    /// Receiver service port.
    pub port: u16,
    /// Individual files to send; empty when a directory was given.
    pub files: Vec<PathBuf>,
    /// Directory tree to send.
    pub dir: Option<PathBuf>,
}

/// Arguments for `lancp receive`.
#[derive(Clone, Debug)]
pub struct ReceiveArgs {
    /// Directory received files are written under.
    pub savedir: PathBuf,
    /// TCP service port to listen on.
    pub port: u16,
    /// Whether existing files may be overwritten.
    pub overwrite: bool,
    /// Settings file written on shutdown.
    pub settings: PathBuf,
}

/// Arguments for `lancp discover`.
#[derive(Clone, Debug)]
pub struct DiscoverArgs {
    /// Listen window for replies.
    pub timeout: Duration,
}

pub(crate) fn build_command() -> Command {
    Command::new("lancp")
        .about("LAN file transfer with peer discovery and resumable transfers")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("send")
                .about("Send files or a directory tree to a peer")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("Receiver host name or address.")
                        .num_args(1)
                        .required(true),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .help("Receiver service port.")
                        .num_args(1)
                        .required(true)
                        .value_parser(value_parser!(u16)),
                )
                .arg(
                    Arg::new("files")
                        .long("files")
                        .value_name("FILE")
                        .help("Files to send, each under its bare name.")
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .value_name("DIR")
                        .help("Directory to send, preserving its layout.")
                        .num_args(1)
                        .value_parser(value_parser!(PathBuf))
                        .conflicts_with("files"),
                )
                .group(
                    ArgGroup::new("source")
                        .args(["files", "dir"])
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("receive")
                .about("Listen for incoming files and answer discovery beacons")
                .arg(
                    Arg::new("savedir")
                        .long("savedir")
                        .value_name("DIR")
                        .help("Directory received files are written under.")
                        .num_args(1)
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .help("TCP service port to listen on.")
                        .num_args(1)
                        .required(true)
                        .value_parser(value_parser!(u16)),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .help("Allow incoming files to replace existing ones.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_name("FILE")
                        .help("Settings file written on shutdown.")
                        .num_args(1)
                        .default_value(DEFAULT_SETTINGS_FILE)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("discover")
                .about("Probe the local broadcast domain for receiving peers")
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECONDS")
                        .help("Listen window for replies.")
                        .num_args(1)
                        .default_value("2")
                        .value_parser(value_parser!(u64)),
                ),
        )
}

pub(crate) fn parse<I>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    let matches = build_command().try_get_matches_from(args)?;
    let (name, sub) = matches
        .subcommand()
        .expect("subcommand is required by the parser");

    let invocation = match name {
        "send" => Invocation::Send(SendArgs {
            host: sub
                .get_one::<String>("host")
                .cloned()
                .expect("host is required"),
            port: *sub.get_one::<u16>("port").expect("port is required"),
            files: sub
                .get_many::<PathBuf>("files")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            dir: sub.get_one::<PathBuf>("dir").cloned(),
        }),
        "receive" => Invocation::Receive(ReceiveArgs {
            savedir: sub
                .get_one::<PathBuf>("savedir")
                .cloned()
                .expect("savedir is required"),
            port: *sub.get_one::<u16>("port").expect("port is required"),
            overwrite: sub.get_flag("overwrite"),
            settings: sub
                .get_one::<PathBuf>("settings")
                .cloned()
                .expect("settings has a default"),
        }),
        "discover" => Invocation::Discover(DiscoverArgs {
            timeout: Duration::from_secs(
                *sub.get_one::<u64>("timeout").expect("timeout has a default"),
            ),
        }),
        other => unreachable!("unknown subcommand {other:?}"),
    };
    Ok(invocation)
}
