//! Per-connection receiver state machine and the cancellable accept loop.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use logging::{EventSink, human_bytes};
use protocol::{CHUNK_SIZE, ControlToken, FileHeader, ProtocolError, frame, path};

use crate::error::RecvError;
use crate::stats::ReceivedCounters;

/// How often the accept loop rechecks the cancellation flag.
const ACCEPT_TICK: Duration = Duration::from_millis(200);

/// Read timeout applied while file bytes stream in, so a stalled sender
/// cannot delay cancellation indefinitely.
const STREAM_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Where and how to listen for incoming files.
#[derive(Clone, Debug)]
pub struct ReceiverConfig {
    /// Directory received files are written under.
    pub save_dir: PathBuf,
    /// TCP service port to listen on; `0` lets the OS pick one.
    pub port: u16,
}

/// What the negotiation decided to do with the connection.
enum Disposition {
    /// The dialogue concluded without a byte stream (reject, skip, same copy).
    Finished,
    /// Stream bytes into `target`, appending at `offset` when resuming.
    Write {
        target: PathBuf,
        offset: u64,
        verb: &'static str,
    },
}

/// Accepts transfer connections and writes the incoming files.
pub struct Receiver {
    listener: TcpListener,
    save_dir: PathBuf,
    counters: Arc<ReceivedCounters>,
    sink: Arc<dyn EventSink>,
}

impl Receiver {
    /// Binds the service port. The listener is non-blocking so the accept
    /// loop can poll the cancellation flag between ticks.
    pub fn bind(
        config: &ReceiverConfig,
        counters: Arc<ReceivedCounters>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, RecvError> {
        let listener =
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).map_err(RecvError::Bind)?;
        listener.set_nonblocking(true).map_err(RecvError::Bind)?;
        Ok(Self {
            listener,
            save_dir: config.save_dir.clone(),
            counters,
            sink,
        })
    }

    /// The address actually bound, useful when the port was `0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the canceled flag is set. Connections are
    /// handled inline, one at a time; per-connection failures are counted and
    /// logged, never fatal to the loop.
    pub fn run(&self) {
        loop {
            if self.counters.is_canceled() {
                return;
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(error) = stream.set_nonblocking(false) {
                        tracing::warn!(%error, "could not configure accepted socket");
                        continue;
                    }
                    self.handle_connection(stream, peer);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_TICK);
                }
                Err(error) => {
                    tracing::warn!(%error, "accept failed");
                    thread::sleep(ACCEPT_TICK);
                }
            }
        }
    }

    fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        self.counters.set_in_progress(true);
        let result = self.serve(&mut stream, peer);
        self.counters.set_in_progress(false);

        match result {
            Ok(()) => {}
            Err(RecvError::Canceled) => {
                self.counters.record_failed();
                self.sink
                    .status("Cancellation requested during file transfer");
            }
            Err(error) => {
                self.counters.record_failed();
                self.sink.status(&format!("Error receiving file: {error}"));
                tracing::warn!(%error, peer = %peer.ip(), "connection failed");
            }
        }
    }

    fn serve(&self, stream: &mut TcpStream, peer: SocketAddr) -> Result<(), RecvError> {
        let header = frame::read_header(stream)?;
        self.sink.status(&format!(
            "Incoming file: {} ({}) from {}",
            header.relative_path,
            human_bytes(header.declared_size),
            peer.ip()
        ));

        let local_relative = path::to_local_separators(&header.relative_path);
        let Some(target) = path::safe_join(&self.save_dir, &local_relative) else {
            frame::write_token(stream, ControlToken::Rejected)?;
            self.counters.record_rejected();
            self.sink.status(&format!(
                "Rejected unsafe path {}",
                header.relative_path
            ));
            return Ok(());
        };

        match self.negotiate(stream, &header, &target)? {
            Disposition::Finished => Ok(()),
            Disposition::Write {
                target,
                offset,
                verb,
            } => self.write_stream(stream, &header, &target, offset, verb),
        }
    }

    fn negotiate(
        &self,
        stream: &mut TcpStream,
        header: &FileHeader,
        target: &Path,
    ) -> Result<Disposition, RecvError> {
        if !target.exists() {
            frame::write_token(stream, ControlToken::AllGood)?;
            return Ok(Disposition::Write {
                target: target.to_path_buf(),
                offset: 0,
                verb: "Received",
            });
        }

        let local_size = fs::metadata(target)
            .map_err(|source| RecvError::TargetUnwritable {
                path: target.to_path_buf(),
                source,
            })?
            .len();
        self.sink.status(&format!(
            "File {} ({}) exists locally",
            header.relative_path,
            human_bytes(local_size)
        ));

        if header.declared_size < local_size {
            // The incoming file cannot contain ours as a prefix; hand the
            // decision to the sender right away.
            frame::write_token(stream, ControlToken::DiffFile)?;
            frame::write_u64(stream, local_size)?;
            return self.read_decision(stream, header, target);
        }

        frame::write_token(stream, ControlToken::ReqCrc32)?;
        frame::write_u64(stream, local_size)?;
        let local_crc = checksums::file_crc32(target).map_err(|source| {
            RecvError::TargetUnwritable {
                path: target.to_path_buf(),
                source,
            }
        })?;
        let sender_crc = frame::read_u32(stream)?;

        if sender_crc == local_crc {
            if header.declared_size == local_size {
                frame::write_token(stream, ControlToken::SameCopy)?;
                self.counters.record_rejected();
                self.sink.status(&format!(
                    "Identical copy of {} already present",
                    header.relative_path
                ));
                return Ok(Disposition::Finished);
            }
            frame::write_token(stream, ControlToken::Resume)?;
            self.sink.status(&format!(
                "{} ({}) checksum match, resuming transfer",
                header.relative_path,
                human_bytes(local_size)
            ));
            return Ok(Disposition::Write {
                target: target.to_path_buf(),
                offset: local_size,
                verb: "Appended",
            });
        }

        frame::write_token(stream, ControlToken::DiffFile)?;
        frame::write_u64(stream, local_size)?;
        self.read_decision(stream, header, target)
    }

    /// Reads the sender's decision after a `DIFF_FILE` answer.
    fn read_decision(
        &self,
        stream: &mut TcpStream,
        header: &FileHeader,
        target: &Path,
    ) -> Result<Disposition, RecvError> {
        match frame::read_token(stream)? {
            ControlToken::ReqOverwrite if self.counters.overwrite() => {
                frame::write_token(stream, ControlToken::AllGood)?;
                Ok(Disposition::Write {
                    target: target.to_path_buf(),
                    offset: 0,
                    verb: "Overwrote",
                })
            }
            ControlToken::ReqOverwrite => {
                frame::write_token(stream, ControlToken::Rejected)?;
                self.counters.record_rejected();
                self.sink.status(&format!(
                    "File {} will not be overwritten",
                    header.relative_path
                ));
                Ok(Disposition::Finished)
            }
            ControlToken::KeepBoth => {
                let sibling = available_sibling(target);
                frame::write_token(stream, ControlToken::AllGood)?;
                self.sink
                    .status(&format!("Keeping both, writing {}", sibling.display()));
                Ok(Disposition::Write {
                    target: sibling,
                    offset: 0,
                    verb: "Received",
                })
            }
            ControlToken::SkipFile => {
                self.counters.record_failed();
                self.sink
                    .status(&format!("Sender skipped {}", header.relative_path));
                Ok(Disposition::Finished)
            }
            token => Err(RecvError::Protocol(ProtocolError::UnexpectedToken(token))),
        }
    }

    fn write_stream(
        &self,
        stream: &mut TcpStream,
        header: &FileHeader,
        target: &Path,
        offset: u64,
        verb: &str,
    ) -> Result<(), RecvError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| RecvError::TargetUnwritable {
                path: target.to_path_buf(),
                source,
            })?;
        }
        let open_result = if offset > 0 {
            OpenOptions::new().append(true).open(target)
        } else {
            File::create(target)
        };
        let mut file = open_result.map_err(|source| RecvError::TargetUnwritable {
            path: target.to_path_buf(),
            source,
        })?;

        // Bounded reads keep the cancellation check live while streaming.
        stream
            .set_read_timeout(Some(STREAM_READ_TIMEOUT))
            .map_err(RecvError::Transport)?;

        let mut buf = [0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            if self.counters.is_canceled() {
                self.sink.status(&format!(
                    "Canceled {} [{} written]",
                    header.relative_path,
                    human_bytes(written)
                ));
                return Err(RecvError::Canceled);
            }
            let read = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => read,
                Err(error)
                    if error.kind() == io::ErrorKind::WouldBlock
                        || error.kind() == io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(error) => return Err(RecvError::Transport(error)),
            };
            file.write_all(&buf[..read])
                .map_err(|source| RecvError::TargetUnwritable {
                    path: target.to_path_buf(),
                    source,
                })?;
            self.counters.add_data(read as u64);
            written += read as u64;
        }

        // EOF short of the announced size means the sender gave up; the
        // partial file stays on disk but is not counted as received.
        if offset + written < header.declared_size {
            return Err(RecvError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the announced size arrived",
            )));
        }

        self.counters.record_received();
        self.sink.status(&format!(
            "{verb} {} [{} written]",
            header.relative_path,
            human_bytes(written)
        ));
        Ok(())
    }
}

/// Finds the first free `name(n).ext` sibling for `path`, smallest `n ≥ 1`.
fn available_sibling(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|ext| ext.to_string_lossy().into_owned());

    let mut n: u64 = 1;
    loop {
        let name = match &extension {
            Some(ext) => format!("{stem}({n}).{ext}"),
            None => format!("{stem}({n})"),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
