//! Server-side echo loop.

use std::io::{Read, Write};

use noisepump_core::Engine;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::exchange::{receive, send};

/// Totals for one echo session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoStats {
    pub messages: u64,
    pub bytes: u64,
}

/// Receive a message, send it back, repeat until the peer closes.
///
/// The peer closing between messages is the normal end and returns the
/// session totals. Every other error ends the session and is returned.
pub fn echo<E, S>(engine: &mut E, conn: &mut Connection<S>) -> Result<EchoStats>
where
    E: Engine + ?Sized,
    S: Read + Write,
{
    let mut stats = EchoStats::default();
    loop {
        let payload = match receive(engine, conn) {
            Ok(payload) => payload,
            Err(Error::PeerClosed) => {
                tracing::debug!(messages = stats.messages, bytes = stats.bytes, "peer closed");
                return Ok(stats);
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(len = payload.len(), text = %payload.to_text(), "echoing");
        send(engine, conn, &payload)?;
        stats.messages += 1;
        stats.bytes += payload.len() as u64;
    }
}
