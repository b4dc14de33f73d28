//! The contract between the pump and a non-blocking secure-transport engine.
//!
//! An engine owns every piece of cryptographic state and never touches a
//! socket. It declares what I/O it needs through [`Engine::intent`] and is
//! told what actually happened through the `notify_*` calls. The pump in the
//! `noisepump` crate is the only code that turns those intents into syscalls.

use thiserror::Error;

/// The I/O an engine is waiting for.
///
/// Absence of an intent (`None` from [`Engine::intent`]) means the engine
/// needs its caller to advance engine-side logic before any I/O makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoIntent {
    /// Ciphertext is queued; [`Engine::output_chunk`] is non-empty.
    WantWrite,
    /// The engine cannot make progress until it sees more ciphertext.
    WantRead,
}

/// Handshake progress as reported by [`Engine::advance_handshake`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    InProgress,
    Established,
    /// Fatal: the peer closed, sent garbage, or failed authentication.
    Failed,
}

/// A non-blocking secure-transport state machine.
///
/// Implementations must keep ciphertext that was not yet written, so a short
/// write only consumes what [`notify_written`](Engine::notify_written) reports.
pub trait Engine {
    /// Current I/O intent, or `None` when no I/O is required right now.
    fn intent(&self) -> Option<IoIntent>;

    /// Ciphertext waiting to be written. Valid until the next engine call.
    fn output_chunk(&self) -> &[u8];

    /// `n` bytes from the front of [`output_chunk`](Engine::output_chunk)
    /// reached the socket.
    fn notify_written(&mut self, n: usize);

    /// Ciphertext read off the socket. An empty slice means end of stream.
    fn notify_read(&mut self, data: &[u8]);

    /// Run as much of the handshake as buffered input allows.
    fn advance_handshake(&mut self) -> HandshakeStatus;

    /// Handshake progress without advancing it.
    fn status(&self) -> HandshakeStatus;

    /// Copy up to `out.len()` decrypted bytes of the current application
    /// message into `out`, returning how many were copied.
    ///
    /// `Err` means a record failed to decrypt or parse; the engine is then
    /// unusable for further application data.
    fn decrypted_length(&mut self, out: &mut [u8]) -> Result<usize, EngineError>;

    /// True once the last byte of the current application message has been
    /// returned by [`decrypted_length`](Engine::decrypted_length). Reset when
    /// the next message starts.
    fn message_complete(&self) -> bool;

    /// Encrypt and frame one application message for sending.
    fn stage_outgoing(&mut self, payload: &[u8]) -> Result<(), EngineError>;
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid Noise pattern string")]
    BadPattern,

    #[error("Noise protocol error: {0}")]
    Noise(#[from] snow::Error),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("secure channel is not established")]
    NotEstablished,

    #[error("engine is closed")]
    Closed,

    #[error("peer static key {0} is not trusted")]
    UntrustedPeer(String),
}
