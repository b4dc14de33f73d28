//! The I/O pump: one engine intent in, at most one socket call out.
//!
//! The pump never loops. Callers get control back after every syscall so
//! they can check a deadline before asking for the next one.

use std::io::{ErrorKind as IoErrorKind, Read, Write};

use noisepump_core::{Engine, IoIntent};

use crate::connection::Connection;
use crate::error::{Error, Result};

/// What a single [`pump`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Wrote this many bytes of the engine's output chunk.
    Wrote(usize),
    /// Read this many bytes and forwarded them. Zero means end of stream.
    Read(usize),
    /// The engine declared no intent; no syscall was made.
    Idle,
    /// The syscall was interrupted by a signal before transferring data.
    /// Nothing was reported to the engine.
    Interrupted,
}

/// Perform the socket operation the engine currently asks for.
///
/// A short write is reported to the engine as-is; the engine keeps the
/// rest of its chunk for the next `WantWrite`.
pub fn pump<E, S>(engine: &mut E, conn: &mut Connection<S>) -> Result<PumpOutcome>
where
    E: Engine + ?Sized,
    S: Read + Write,
{
    let (stream, scratch) = conn.parts();

    match engine.intent() {
        Some(IoIntent::WantWrite) => {
            let chunk = engine.output_chunk();
            let n = match stream.write(chunk) {
                Ok(0) if !chunk.is_empty() => {
                    return Err(Error::Io(IoErrorKind::WriteZero.into()));
                }
                Ok(n) => n,
                Err(e) if e.kind() == IoErrorKind::Interrupted => {
                    return Ok(PumpOutcome::Interrupted)
                }
                Err(e) => return Err(e.into()),
            };
            tracing::trace!(requested = chunk.len(), written = n, "pump write");
            engine.notify_written(n);
            Ok(PumpOutcome::Wrote(n))
        }
        Some(IoIntent::WantRead) => {
            let buf = scratch.zeroed();
            let n = match stream.read(buf) {
                Ok(n) => n,
                Err(e) if e.kind() == IoErrorKind::Interrupted => {
                    return Ok(PumpOutcome::Interrupted)
                }
                Err(e) => return Err(e.into()),
            };
            tracing::trace!(capacity = buf.len(), read = n, "pump read");
            engine.notify_read(&buf[..n]);
            Ok(PumpOutcome::Read(n))
        }
        None => Ok(PumpOutcome::Idle),
    }
}
