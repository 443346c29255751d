//! End-to-end exercises of the sender/receiver pair over loopback TCP.

use std::fs;
use std::net::{Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use engine::{
    ConflictChoice, ConflictRequest, ConflictResolver, ReceivedCounters, ReceivedSnapshot,
    Receiver, ReceiverConfig, SendError, SendOutcome, Sender, SentCounters, TransferRequest,
};
use logging::NullSink;

/// Test resolver that always gives the same answer.
struct FixedResolver(ConflictChoice);

impl ConflictResolver for FixedResolver {
    fn resolve(&self, _request: &ConflictRequest) -> ConflictChoice {
        self.0
    }
}

struct Harness {
    counters: Arc<ReceivedCounters>,
    save_dir: tempfile::TempDir,
    port: u16,
    worker: thread::JoinHandle<()>,
}

impl Harness {
    fn start(overwrite: bool) -> Self {
        let save_dir = tempfile::tempdir().expect("create save dir");
        let counters = Arc::new(ReceivedCounters::new());
        counters.set_overwrite(overwrite);

        let config = ReceiverConfig {
            save_dir: save_dir.path().to_path_buf(),
            port: 0,
        };
        let receiver = Receiver::bind(&config, Arc::clone(&counters), Arc::new(NullSink))
            .expect("bind receiver");
        let port = receiver.local_addr().expect("local addr").port();
        let worker = thread::spawn(move || receiver.run());

        Self {
            counters,
            save_dir,
            port,
            worker,
        }
    }

    fn sender(&self, counters: &Arc<SentCounters>, choice: ConflictChoice) -> Sender {
        Sender::new(
            Ipv4Addr::LOCALHOST.to_string(),
            self.port,
            Arc::clone(counters),
            Arc::new(FixedResolver(choice)),
            Arc::new(NullSink),
        )
    }

    fn saved(&self, name: &str) -> PathBuf {
        self.save_dir.path().join(name)
    }

    /// Polls the receiver snapshot until `predicate` holds.
    fn wait_for(&self, predicate: impl Fn(&ReceivedSnapshot) -> bool) -> ReceivedSnapshot {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = self.counters.snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            assert!(Instant::now() < deadline, "receiver never reached expected state");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn shutdown(self) {
        self.counters.cancel();
        self.worker.join().expect("receiver worker");
    }
}

fn write_source(dir: &Path, name: &str, contents: &[u8]) -> TransferRequest {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write source");
    TransferRequest::for_file(path)
}

/// Deterministic filler so resumed halves are distinguishable.
fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn fresh_transfer_writes_file_and_counters() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "a.txt", b"hello\n");

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Skip);
    let outcome = sender.send_file(&request).expect("send");
    assert_eq!(
        outcome,
        SendOutcome::Sent {
            bytes: 6,
            resumed: false
        }
    );

    let snapshot = harness.wait_for(|s| s.received_files == 1);
    assert_eq!(snapshot.data_received, 6);
    assert_eq!(snapshot.failed_files, 0);
    assert_eq!(fs::read(harness.saved("a.txt")).unwrap(), b"hello\n");

    let sent = counters.snapshot();
    assert_eq!(sent.bytes_sent, 6);
    assert_eq!(sent.processed_files, 1);
    assert_eq!(sent.failed_files, 0);

    harness.shutdown();
}

#[test]
fn directory_transfer_preserves_relative_layout() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let tree = src.path().join("album");
    fs::create_dir_all(tree.join("2024")).unwrap();
    fs::write(tree.join("cover.txt"), b"cover").unwrap();
    fs::write(tree.join("2024").join("track.txt"), b"track-data").unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Skip);
    let failed = sender.send_directory(&tree).expect("send directory");
    assert_eq!(failed, 0);

    harness.wait_for(|s| s.received_files == 2);
    assert_eq!(
        fs::read(harness.save_dir.path().join("album").join("cover.txt")).unwrap(),
        b"cover"
    );
    assert_eq!(
        fs::read(
            harness
                .save_dir
                .path()
                .join("album")
                .join("2024")
                .join("track.txt")
        )
        .unwrap(),
        b"track-data"
    );

    harness.shutdown();
}

#[test]
fn matching_prefix_resumes_and_appends_the_remainder() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let data = patterned(64 * 1024);
    let request = write_source(src.path(), "data.bin", &data);

    // The receiver already holds an identical first quarter.
    fs::write(harness.saved("data.bin"), &data[..16 * 1024]).unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Skip);
    let outcome = sender.send_file(&request).expect("send");
    assert_eq!(
        outcome,
        SendOutcome::Sent {
            bytes: 48 * 1024,
            resumed: true
        }
    );

    let snapshot = harness.wait_for(|s| s.received_files == 1);
    assert_eq!(snapshot.data_received, 48 * 1024);
    assert_eq!(fs::read(harness.saved("data.bin")).unwrap(), data);
    assert_eq!(counters.snapshot().bytes_sent, 48 * 1024);

    harness.shutdown();
}

#[test]
fn identical_copy_transfers_nothing() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let data = patterned(1024);
    let request = write_source(src.path(), "same.bin", &data);
    fs::write(harness.saved("same.bin"), &data).unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Skip);
    let outcome = sender.send_file(&request).expect("send");
    assert_eq!(outcome, SendOutcome::AlreadyPresent);

    let snapshot = harness.wait_for(|s| s.rejected_files == 1);
    assert_eq!(snapshot.received_files, 0);
    assert_eq!(snapshot.data_received, 0);

    let sent = counters.snapshot();
    assert_eq!(sent.bytes_sent, 0);
    assert_eq!(sent.processed_files, 1);
    assert_eq!(sent.failed_files, 0);
    assert_eq!(fs::read(harness.saved("same.bin")).unwrap(), data);

    harness.shutdown();
}

#[test]
fn overwrite_request_is_rejected_when_policy_forbids_it() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "conflict.txt", b"BBBBB");
    fs::write(harness.saved("conflict.txt"), b"AAAAA").unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Overwrite);
    let error = sender.send_file(&request).unwrap_err();
    assert!(matches!(error, SendError::Rejected));

    let snapshot = harness.wait_for(|s| s.rejected_files == 1);
    assert_eq!(snapshot.received_files, 0);
    assert_eq!(fs::read(harness.saved("conflict.txt")).unwrap(), b"AAAAA");

    let sent = counters.snapshot();
    assert_eq!(sent.processed_files, 1);
    assert_eq!(sent.failed_files, 1);

    harness.shutdown();
}

#[test]
fn overwrite_request_replaces_the_file_when_allowed() {
    let harness = Harness::start(true);
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "conflict.txt", b"fresh contents");
    fs::write(harness.saved("conflict.txt"), b"stale").unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Overwrite);
    sender.send_file(&request).expect("send");

    harness.wait_for(|s| s.received_files == 1);
    assert_eq!(
        fs::read(harness.saved("conflict.txt")).unwrap(),
        b"fresh contents"
    );

    harness.shutdown();
}

#[test]
fn keep_both_writes_a_numbered_sibling() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "doc.txt", b"incoming version");
    fs::write(harness.saved("doc.txt"), b"original").unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::KeepBoth);
    sender.send_file(&request).expect("send");

    harness.wait_for(|s| s.received_files == 1);
    assert_eq!(fs::read(harness.saved("doc.txt")).unwrap(), b"original");
    assert_eq!(
        fs::read(harness.saved("doc(1).txt")).unwrap(),
        b"incoming version"
    );

    harness.shutdown();
}

#[test]
fn skip_after_conflict_fails_the_file_on_both_sides() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "doc.txt", b"incoming version");
    fs::write(harness.saved("doc.txt"), b"original").unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Skip);
    let error = sender.send_file(&request).unwrap_err();
    assert!(matches!(error, SendError::Skipped));

    let snapshot = harness.wait_for(|s| s.failed_files == 1);
    assert_eq!(snapshot.received_files, 0);
    assert_eq!(fs::read(harness.saved("doc.txt")).unwrap(), b"original");
    assert_eq!(counters.snapshot().failed_files, 1);

    harness.shutdown();
}

#[test]
fn smaller_incoming_file_negotiates_without_a_checksum() {
    // declared < local goes straight to DIFF_FILE.
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "notes.txt", b"tiny");
    fs::write(harness.saved("notes.txt"), patterned(4096)).unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::KeepBoth);
    sender.send_file(&request).expect("send");

    harness.wait_for(|s| s.received_files == 1);
    assert_eq!(fs::read(harness.saved("notes(1).txt")).unwrap(), b"tiny");

    harness.shutdown();
}

#[test]
fn corrupted_prefix_falls_back_to_conflict_negotiation() {
    // Same name, sender larger, but the receiver's prefix bytes differ:
    // the CRC mismatch must route into DIFF_FILE instead of RESUME.
    let harness = Harness::start(true);
    let src = tempfile::tempdir().unwrap();
    let data = patterned(8 * 1024);
    let request = write_source(src.path(), "data.bin", &data);

    let mut corrupted = data[..4096].to_vec();
    corrupted[100] ^= 0xFF;
    fs::write(harness.saved("data.bin"), &corrupted).unwrap();

    let counters = Arc::new(SentCounters::new());
    let sender = harness.sender(&counters, ConflictChoice::Overwrite);
    let outcome = sender.send_file(&request).expect("send");
    assert_eq!(
        outcome,
        SendOutcome::Sent {
            bytes: 8 * 1024,
            resumed: false
        }
    );

    harness.wait_for(|s| s.received_files == 1);
    assert_eq!(fs::read(harness.saved("data.bin")).unwrap(), data);

    harness.shutdown();
}

#[test]
fn cancel_before_streaming_fails_the_file_on_both_sides() {
    let harness = Harness::start(false);
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "big.bin", &patterned(100 * 1024));

    let counters = Arc::new(SentCounters::new());
    // Cancel lands after negotiation but before the first chunk goes out.
    counters.cancel();
    let sender = harness.sender(&counters, ConflictChoice::Skip);
    let error = sender.send_file(&request).unwrap_err();
    assert!(matches!(error, SendError::Canceled));

    // The receiver sees the connection end short of the announced size and
    // must not count the partial file as received.
    let snapshot = harness.wait_for(|s| s.failed_files == 1);
    assert_eq!(snapshot.received_files, 0);

    let sent = counters.snapshot();
    assert_eq!(sent.processed_files, 1);
    assert_eq!(sent.failed_files, 1);
    assert_eq!(sent.bytes_sent, 0);

    harness.shutdown();
}

#[test]
fn canceled_batch_fails_remaining_files_without_connecting() {
    let src = tempfile::tempdir().unwrap();
    let requests = vec![
        write_source(src.path(), "one.txt", b"1"),
        write_source(src.path(), "two.txt", b"2"),
    ];

    let counters = Arc::new(SentCounters::new());
    counters.cancel();
    // Port 1 is never listening; a connection attempt would fail loudly.
    let sender = Sender::new(
        Ipv4Addr::LOCALHOST.to_string(),
        1,
        Arc::clone(&counters),
        Arc::new(FixedResolver(ConflictChoice::Skip)),
        Arc::new(NullSink),
    );

    assert_eq!(sender.send_batch(&requests), 2);
    let sent = counters.snapshot();
    assert_eq!(sent.processed_files, 2);
    assert_eq!(sent.failed_files, 2);
    assert_eq!(sent.bytes_sent, 0);
}

#[test]
fn refused_connection_fails_the_file_but_not_the_batch() {
    let src = tempfile::tempdir().unwrap();
    let request = write_source(src.path(), "a.txt", b"abc");

    // Reserve a port, then free it so nothing is listening there.
    let port = {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.local_addr().unwrap().port()
    };

    let counters = Arc::new(SentCounters::new());
    let sender = Sender::new(
        Ipv4Addr::LOCALHOST.to_string(),
        port,
        Arc::clone(&counters),
        Arc::new(FixedResolver(ConflictChoice::Skip)),
        Arc::new(NullSink),
    );

    let error = sender.send_file(&request).unwrap_err();
    assert!(matches!(error, SendError::Connect(_)));
    assert_eq!(counters.snapshot().failed_files, 1);
}

#[test]
fn cancellation_stops_the_accept_loop_within_a_second() {
    let harness = Harness::start(false);
    let counters = Arc::clone(&harness.counters);
    let worker = harness.worker;

    let start = Instant::now();
    counters.cancel();
    worker.join().expect("receiver worker");
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "accept loop took too long to observe cancellation"
    );
}
