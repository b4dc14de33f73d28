//! Errors returned by the pump and the drivers.
//!
//! Nothing in this crate retries or swallows an error: every variant is
//! terminal for the session and is returned to the caller, who owns the
//! connection and the engine and decides how to tear them down.

use noisepump_core::EngineError;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket read or write failed.
    IoFailure,
    /// The engine failed, or the peer vanished, before the channel was up.
    HandshakeFailed,
    /// The engine rejected received application data.
    MalformedRecord,
    /// The peer closed the stream outside the handshake. Normal end of an
    /// echo session.
    PeerClosed,
    /// A deadline expired between two pump steps, or a socket timeout fired.
    Timeout,
    /// The engine refused to stage outgoing data.
    Engine,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("socket I/O failed: {0}")]
    Io(#[source] std::io::Error),

    #[error("handshake failed: {0}")]
    HandshakeFailed(&'static str),

    #[error("malformed record: {0}")]
    MalformedRecord(#[source] EngineError),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("deadline expired")]
    Timeout,

    #[error("engine refused operation: {0}")]
    Engine(#[source] EngineError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::IoFailure,
            Error::HandshakeFailed(_) => ErrorKind::HandshakeFailed,
            Error::MalformedRecord(_) => ErrorKind::MalformedRecord,
            Error::PeerClosed => ErrorKind::PeerClosed,
            Error::Timeout => ErrorKind::Timeout,
            Error::Engine(_) => ErrorKind::Engine,
        }
    }

    /// The OS error code behind an I/O failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(e),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// First OS error code found along an error's source chain.
///
/// Processes use it as their exit status.
pub fn os_error_code(err: &(dyn std::error::Error + 'static)) -> Option<i32> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(code) = e.downcast_ref::<std::io::Error>().and_then(|io| io.raw_os_error()) {
            return Some(code);
        }
        current = e.source();
    }
    None
}
