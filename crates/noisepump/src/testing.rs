//! Test doubles: a scripted engine and an in-memory stream that counts
//! syscalls.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use noisepump_core::{Engine, EngineError, HandshakeStatus, IoIntent};

/// Engine whose behaviour is set up front by the test.
///
/// Received bytes are treated as plaintext directly; message boundaries
/// come from `messages` (one entry per expected message length).
#[derive(Default)]
pub struct ScriptedEngine {
    pub outgoing: Vec<u8>,
    pub want_read: bool,
    pub eof: bool,

    /// Counts passed to `notify_written`, in order.
    pub written: Vec<usize>,
    /// Counts passed to `notify_read`, in order (0 for end of stream).
    pub reads: Vec<usize>,
    /// All non-empty data passed to `notify_read`.
    pub received: Vec<u8>,
    pub staged: Vec<Vec<u8>>,
    pub advances: usize,

    status: Option<HandshakeStatus>,
    statuses: VecDeque<HandshakeStatus>,
    advance_output: VecDeque<Vec<u8>>,
    messages: VecDeque<usize>,
    delivered: usize,
    complete: bool,
    malformed: bool,
    refuse_staging: bool,
    fail_on_eof: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already past the handshake.
    pub fn established() -> Self {
        Self {
            status: Some(HandshakeStatus::Established),
            ..Self::default()
        }
    }

    /// Declares `WantRead` whenever it has nothing to write, even after end
    /// of stream.
    pub fn reading(mut self) -> Self {
        self.want_read = true;
        self
    }

    /// Statuses returned by successive `advance_handshake` calls. Once the
    /// script runs out the last status repeats (`InProgress` if empty).
    pub fn with_statuses(mut self, statuses: &[HandshakeStatus]) -> Self {
        self.statuses = statuses.iter().copied().collect();
        self
    }

    /// Output queued by the n-th `advance_handshake` call.
    pub fn with_advance_output(mut self, outputs: &[&str]) -> Self {
        self.advance_output = outputs.iter().map(|o| o.as_bytes().to_vec()).collect();
        self
    }

    pub fn with_messages(mut self, lengths: &[usize]) -> Self {
        self.messages = lengths.iter().copied().collect();
        self
    }

    /// `advance_handshake` reports `Failed` once end of stream was seen.
    pub fn failing_on_eof(mut self) -> Self {
        self.fail_on_eof = true;
        self
    }

    pub fn malformed(mut self) -> Self {
        self.malformed = true;
        self
    }

    pub fn refusing_staging(mut self) -> Self {
        self.refuse_staging = true;
        self
    }

    pub fn queue_output(&mut self, data: &[u8]) {
        self.outgoing.extend_from_slice(data);
    }
}

impl Engine for ScriptedEngine {
    fn intent(&self) -> Option<IoIntent> {
        if !self.outgoing.is_empty() {
            Some(IoIntent::WantWrite)
        } else if self.want_read {
            Some(IoIntent::WantRead)
        } else {
            None
        }
    }

    fn output_chunk(&self) -> &[u8] {
        &self.outgoing
    }

    fn notify_written(&mut self, n: usize) {
        self.written.push(n);
        self.outgoing.drain(..n.min(self.outgoing.len()));
    }

    fn notify_read(&mut self, data: &[u8]) {
        self.reads.push(data.len());
        if data.is_empty() {
            self.eof = true;
        }
        self.received.extend_from_slice(data);
    }

    fn advance_handshake(&mut self) -> HandshakeStatus {
        self.advances += 1;
        if let Some(output) = self.advance_output.pop_front() {
            self.outgoing.extend_from_slice(&output);
        }
        let status = if self.fail_on_eof && self.eof {
            HandshakeStatus::Failed
        } else if let Some(next) = self.statuses.pop_front() {
            next
        } else {
            self.status.unwrap_or(HandshakeStatus::InProgress)
        };
        self.status = Some(status);
        status
    }

    fn status(&self) -> HandshakeStatus {
        self.status.unwrap_or(HandshakeStatus::InProgress)
    }

    fn decrypted_length(&mut self, out: &mut [u8]) -> Result<usize, EngineError> {
        if self.malformed {
            return Err(EngineError::MalformedRecord("scripted".into()));
        }
        if self.complete {
            self.complete = false;
            self.messages.pop_front();
        }
        let Some(remaining) = self.messages.front_mut() else {
            return Ok(0);
        };
        let available = self.received.len() - self.delivered;
        let n = out.len().min(available).min(*remaining);
        out[..n].copy_from_slice(&self.received[self.delivered..self.delivered + n]);
        self.delivered += n;
        *remaining -= n;
        self.complete = *remaining == 0;
        Ok(n)
    }

    fn message_complete(&self) -> bool {
        self.complete
    }

    fn stage_outgoing(&mut self, payload: &[u8]) -> Result<(), EngineError> {
        if self.refuse_staging {
            return Err(EngineError::Closed);
        }
        self.staged.push(payload.to_vec());
        self.outgoing.extend_from_slice(payload);
        Ok(())
    }
}

/// In-memory stream. Reads are served from a queue (an empty queue reads
/// as end of stream); writes are collected.
#[derive(Default)]
pub struct MockStream {
    reads: VecDeque<io::Result<Vec<u8>>>,
    write_errors: VecDeque<io::ErrorKind>,
    max_write: Option<usize>,
    fail_writes: bool,

    pub written: Vec<u8>,
    pub read_calls: usize,
    pub write_calls: usize,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read(mut self, data: &[u8]) -> Self {
        self.reads.push_back(Ok(data.to_vec()));
        self
    }

    pub fn with_read_error(mut self, kind: io::ErrorKind) -> Self {
        self.reads.push_back(Err(kind.into()));
        self
    }

    /// Accept at most `n` bytes per write call.
    pub fn max_write(mut self, n: usize) -> Self {
        self.max_write = Some(n);
        self
    }

    /// Fail the next write call with `kind`; later writes succeed.
    pub fn with_write_error(mut self, kind: io::ErrorKind) -> Self {
        self.write_errors.push_back(kind);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_calls += 1;
        match self.reads.pop_front() {
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(data)) => {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.reads.push_front(Ok(data[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_calls += 1;
        if let Some(kind) = self.write_errors.pop_front() {
            return Err(kind.into());
        }
        if self.fail_writes {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let n = buf.len().min(self.max_write.unwrap_or(usize::MAX));
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
