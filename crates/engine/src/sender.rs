//! Per-file sender state machine.
//!
//! One TCP connection per file: header out, decision token in, optional
//! prefix-CRC handshake or conflict negotiation, then bytes until EOF. Every
//! terminal state updates the shared counters; failures are recorded and the
//! batch continues.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use logging::EventSink;
use protocol::{CHUNK_SIZE, ControlToken, ProtocolError, frame};

use crate::conflict::{ConflictChoice, ConflictRequest, ConflictResolver};
use crate::error::SendError;
use crate::stats::SentCounters;
use crate::walk::walk_files;

/// One file queued for sending.
#[derive(Clone, Debug)]
pub struct TransferRequest {
    /// Local path of the source file.
    pub path: PathBuf,
    /// Directory the wire-relative path is computed against.
    pub root: PathBuf,
    /// Directory name prepended on the wire; empty for bare files.
    pub base: String,
}

impl TransferRequest {
    /// Queues a single file; the receiver sees just the file name.
    #[must_use]
    pub fn for_file(path: PathBuf) -> Self {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            root,
            base: String::new(),
        }
    }

    /// The relative path announced in the header, in local separators.
    #[must_use]
    pub fn wire_path(&self) -> String {
        let relative = self.path.strip_prefix(&self.root).unwrap_or(&self.path);
        if self.base.is_empty() {
            relative.to_string_lossy().into_owned()
        } else {
            Path::new(&self.base)
                .join(relative)
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// Terminal state of one file, from the sender's side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Bytes were streamed; `resumed` when streaming began mid-file.
    Sent {
        /// Bytes written to the socket for this file.
        bytes: u64,
        /// Whether the transfer picked up after a matched prefix.
        resumed: bool,
    },
    /// The receiver already holds an identical copy; nothing was streamed.
    AlreadyPresent,
}

/// Sends files to one peer, one connection per file.
pub struct Sender {
    host: String,
    port: u16,
    counters: Arc<SentCounters>,
    resolver: Arc<dyn ConflictResolver>,
    sink: Arc<dyn EventSink>,
}

impl Sender {
    /// Creates a sender targeting `host:port`.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        counters: Arc<SentCounters>,
        resolver: Arc<dyn ConflictResolver>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            counters,
            resolver,
            sink,
        }
    }

    /// Sends one file, updating counters on every exit path.
    pub fn send_file(&self, request: &TransferRequest) -> Result<SendOutcome, SendError> {
        let wire_path = request.wire_path();
        match self.transfer(request, &wire_path) {
            Ok(outcome) => {
                self.counters.record_success();
                match outcome {
                    SendOutcome::Sent { .. } => {
                        self.sink.status(&format!("{wire_path} sent successfully"));
                    }
                    SendOutcome::AlreadyPresent => {
                        self.sink.status(&format!(
                            "Identical copy of {wire_path} already on receiver"
                        ));
                    }
                }
                Ok(outcome)
            }
            Err(error) => {
                self.counters.record_failure();
                self.sink
                    .status(&format!("Error sending {wire_path}: {error}"));
                tracing::debug!(path = %request.path.display(), %error, "send failed");
                Err(error)
            }
        }
    }

    /// Drains the request list in order, continuing past per-file failures.
    /// Returns how many files failed.
    pub fn send_batch(&self, requests: &[TransferRequest]) -> u64 {
        let mut failed = 0;
        for request in requests {
            if self.counters.is_canceled() {
                // Remaining entries are accounted as failures, like a cancel
                // mid-file would be.
                self.counters.record_failure();
                failed += 1;
                continue;
            }
            if self.send_file(request).is_err() {
                failed += 1;
            }
        }
        failed
    }

    /// Walks `dir` and sends every file under it, preserving the layout
    /// below the directory's own name. Returns how many files failed.
    pub fn send_directory(&self, dir: &Path) -> Result<u64, SendError> {
        let files = walk_files(dir).map_err(SendError::Source)?;
        let base = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let requests: Vec<TransferRequest> = files
            .into_iter()
            .map(|path| TransferRequest {
                path,
                root: dir.to_path_buf(),
                base: base.clone(),
            })
            .collect();
        Ok(self.send_batch(&requests))
    }

    fn transfer(
        &self,
        request: &TransferRequest,
        wire_path: &str,
    ) -> Result<SendOutcome, SendError> {
        let file_size = std::fs::metadata(&request.path)
            .map_err(SendError::Source)?
            .len();

        let mut stream =
            TcpStream::connect((self.host.as_str(), self.port)).map_err(SendError::Connect)?;
        frame::write_header(&mut stream, wire_path, file_size)?;

        let mut resume_offset = 0u64;
        match frame::read_token(&mut stream)? {
            ControlToken::AllGood => {}
            ControlToken::Rejected => return Err(SendError::Rejected),
            ControlToken::ReqCrc32 => {
                let remote_size = frame::read_u64(&mut stream)?;
                let crc = checksums::file_prefix_crc32(&request.path, remote_size)
                    .map_err(SendError::Source)?;
                frame::write_u32(&mut stream, crc)?;

                match frame::read_token(&mut stream)? {
                    ControlToken::SameCopy => return Ok(SendOutcome::AlreadyPresent),
                    ControlToken::Resume => resume_offset = remote_size,
                    ControlToken::DiffFile => {
                        let remote_size = frame::read_u64(&mut stream)?;
                        self.negotiate_conflict(&mut stream, wire_path, remote_size, file_size)?;
                    }
                    ControlToken::Rejected => return Err(SendError::Rejected),
                    token => return Err(unexpected(token)),
                }
            }
            ControlToken::DiffFile => {
                let remote_size = frame::read_u64(&mut stream)?;
                self.negotiate_conflict(&mut stream, wire_path, remote_size, file_size)?;
            }
            token => return Err(unexpected(token)),
        }

        let bytes = self.stream_bytes(&mut stream, &request.path, resume_offset, wire_path)?;
        Ok(SendOutcome::Sent {
            bytes,
            resumed: resume_offset > 0,
        })
    }

    /// Settles a `DIFF_FILE` answer: ask the broker, forward the decision,
    /// and wait for the receiver's final word.
    fn negotiate_conflict(
        &self,
        stream: &mut TcpStream,
        wire_path: &str,
        remote_size: u64,
        local_size: u64,
    ) -> Result<(), SendError> {
        let request = ConflictRequest {
            relative_path: wire_path.to_owned(),
            remote_size,
            local_size,
        };
        let choice = self.resolver.resolve(&request);
        let token = match choice {
            ConflictChoice::Overwrite => ControlToken::ReqOverwrite,
            ConflictChoice::KeepBoth => ControlToken::KeepBoth,
            ConflictChoice::Skip => ControlToken::SkipFile,
        };
        frame::write_token(stream, token)?;
        if choice == ConflictChoice::Skip {
            return Err(SendError::Skipped);
        }

        match frame::read_token(stream)? {
            ControlToken::AllGood => Ok(()),
            ControlToken::Rejected => Err(SendError::Rejected),
            token => Err(unexpected(token)),
        }
    }

    fn stream_bytes(
        &self,
        stream: &mut TcpStream,
        path: &Path,
        offset: u64,
        wire_path: &str,
    ) -> Result<u64, SendError> {
        let mut file = File::open(path).map_err(SendError::Source)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .map_err(SendError::Source)?;
            self.sink.status(&format!(
                "Resuming {wire_path} transfer to {}:{}",
                self.host, self.port
            ));
        } else {
            self.sink
                .status(&format!("Sending {wire_path} to {}:{}", self.host, self.port));
        }

        let mut buf = [0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            if self.counters.is_canceled() {
                return Err(SendError::Canceled);
            }
            let read = file.read(&mut buf).map_err(SendError::Source)?;
            if read == 0 {
                break;
            }
            stream
                .write_all(&buf[..read])
                .map_err(SendError::Transport)?;
            self.counters.add_bytes(read as u64);
            total += read as u64;
        }
        Ok(total)
    }
}

fn unexpected(token: ControlToken) -> SendError {
    SendError::Protocol(ProtocolError::UnexpectedToken(token))
}
