//! The three subcommands, wired to the engine crates.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use discovery::{DISCOVERY_PORT, DiscoveryServer, discover_peers};
use engine::{
    ConsoleResolver, ReceivedCounters, Receiver, ReceiverConfig, Sender, SentCounters,
    TransferRequest,
};
use logging::{ConsoleSink, EventSink, human_bytes};

use crate::args::{DiscoverArgs, ReceiveArgs, SendArgs};
use crate::settings::Settings;
use crate::signal;
use crate::{EXIT_FAILURE, EXIT_OK};

/// Cadence of the receiver's stats watcher while a transfer is in flight.
const STATS_TICK: Duration = Duration::from_millis(300);

pub(crate) fn send<Out, Err>(args: SendArgs, stdout: &mut Out, stderr: &mut Err) -> i32
where
    Out: Write,
    Err: Write,
{
    let counters = Arc::new(SentCounters::new());
    signal::install();
    signal::propagate_to({
        let counters = Arc::clone(&counters);
        move || counters.cancel()
    });

    let resolver = Arc::new(ConsoleResolver::new(Arc::clone(&counters)));
    let sink: Arc<dyn EventSink> = Arc::new(ConsoleSink);
    let sender = Sender::new(
        args.host,
        args.port,
        Arc::clone(&counters),
        resolver,
        sink,
    );

    let failed = if let Some(dir) = args.dir {
        match sender.send_directory(&dir) {
            Ok(failed) => failed,
            Err(error) => {
                let _ = writeln!(stderr, "lancp: cannot send '{}': {error}", dir.display());
                return EXIT_FAILURE;
            }
        }
    } else {
        let requests: Vec<TransferRequest> = args
            .files
            .into_iter()
            .map(TransferRequest::for_file)
            .collect();
        sender.send_batch(&requests)
    };

    let snapshot = counters.snapshot();
    let _ = writeln!(
        stdout,
        "{} files processed, {} failed, {} sent",
        snapshot.processed_files,
        snapshot.failed_files,
        human_bytes(snapshot.bytes_sent)
    );

    if failed == 0 { EXIT_OK } else { EXIT_FAILURE }
}

pub(crate) fn receive<Out, Err>(args: ReceiveArgs, stdout: &mut Out, stderr: &mut Err) -> i32
where
    Out: Write,
    Err: Write,
{
    let counters = Arc::new(ReceivedCounters::new());
    counters.set_overwrite(args.overwrite);
    signal::install();
    signal::propagate_to({
        let counters = Arc::clone(&counters);
        move || counters.cancel()
    });

    // Answer discovery beacons for as long as we are receiving. Losing the
    // responder degrades discovery, not transfers.
    match DiscoveryServer::spawn(DISCOVERY_PORT, args.port) {
        Ok(server) => {
            tracing::debug!(addr = %server.local_addr(), "discovery responder running");
        }
        Err(error) => tracing::warn!(%error, "discovery responder unavailable"),
    }

    let sink: Arc<dyn EventSink> = Arc::new(ConsoleSink);
    let config = ReceiverConfig {
        save_dir: args.savedir.clone(),
        port: args.port,
    };
    let receiver = match Receiver::bind(&config, Arc::clone(&counters), Arc::clone(&sink)) {
        Ok(receiver) => receiver,
        Err(error) => {
            let _ = writeln!(stderr, "lancp: {error}");
            return EXIT_FAILURE;
        }
    };
    let _ = writeln!(
        stdout,
        "Listening for incoming connections on port {}",
        args.port
    );

    let stats_worker = {
        let counters = Arc::clone(&counters);
        let sink = Arc::clone(&sink);
        thread::spawn(move || {
            loop {
                if counters.is_canceled() {
                    return;
                }
                if counters.in_progress() {
                    let snapshot = counters.snapshot();
                    sink.status(&format!(
                        "{} files received, {} failed, {} rejected; {} received",
                        snapshot.received_files,
                        snapshot.failed_files,
                        snapshot.rejected_files,
                        human_bytes(snapshot.data_received)
                    ));
                }
                thread::sleep(STATS_TICK);
            }
        })
    };

    receiver.run();
    let _ = stats_worker.join();

    let snapshot = counters.snapshot();
    let _ = writeln!(
        stdout,
        "{} files received, {} failed, {} rejected; {} received",
        snapshot.received_files,
        snapshot.failed_files,
        snapshot.rejected_files,
        human_bytes(snapshot.data_received)
    );

    // Mirror the front-end behaviour of persisting the active configuration
    // on the way out.
    let settings = Settings {
        savedir: args.savedir,
        port: args.port,
        overwrite: counters.overwrite(),
    };
    if let Err(error) = settings.save(&args.settings) {
        tracing::warn!(%error, path = %args.settings.display(), "could not save settings");
    }

    EXIT_OK
}

pub(crate) fn discover<Out, Err>(args: DiscoverArgs, stdout: &mut Out, stderr: &mut Err) -> i32
where
    Out: Write,
    Err: Write,
{
    let info = match discovery::probe() {
        Ok(info) => info,
        Err(error) => {
            let _ = writeln!(stderr, "lancp: {error}");
            return EXIT_FAILURE;
        }
    };
    let _ = writeln!(stdout, "Broadcast address: {}", info.broadcast());

    match discover_peers(info.broadcast(), DISCOVERY_PORT, args.timeout) {
        Ok(peers) if peers.is_empty() => {
            let _ = writeln!(stdout, "No peers answered.");
            EXIT_OK
        }
        Ok(peers) => {
            for peer in peers {
                let _ = writeln!(stdout, "{}  {}  {}", peer.hostname, peer.address, peer.port);
            }
            EXIT_OK
        }
        Err(error) => {
            let _ = writeln!(stderr, "lancp: {error}");
            EXIT_FAILURE
        }
    }
}
