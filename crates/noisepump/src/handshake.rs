//! Handshake driver: pump, advance, repeat until the engine decides.

use std::io::{Read, Write};

use noisepump_core::{Engine, HandshakeStatus};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::pump::{pump, PumpOutcome};

/// Drive the engine's handshake to completion over `conn`.
///
/// Returns once the engine reports `Established`, without any I/O if it
/// already does. Any failure is fatal for the connection; nothing is
/// retried.
pub fn handshake<E, S>(engine: &mut E, conn: &mut Connection<S>) -> Result<()>
where
    E: Engine + ?Sized,
    S: Read + Write,
{
    match engine.status() {
        HandshakeStatus::Established => return Ok(()),
        HandshakeStatus::Failed => return Err(Error::HandshakeFailed("engine already failed")),
        HandshakeStatus::InProgress => {}
    }
    tracing::debug!("handshake started");

    let mut steps = 0usize;
    let mut idle_streak = 0u8;
    loop {
        conn.check_deadline()?;
        let outcome = pump(engine, conn)?;
        let status = engine.advance_handshake();
        steps += 1;
        tracing::trace!(step = steps, ?outcome, ?status, "handshake step");

        match status {
            HandshakeStatus::Established => {
                tracing::debug!(steps, "handshake complete");
                return Ok(());
            }
            HandshakeStatus::Failed => return Err(Error::HandshakeFailed("engine reported failure")),
            HandshakeStatus::InProgress => {}
        }

        match outcome {
            // The engine saw end of stream and still did not give up; another
            // read would return zero again forever.
            PumpOutcome::Read(0) => {
                return Err(Error::HandshakeFailed("peer closed during handshake"))
            }
            PumpOutcome::Idle => {
                idle_streak += 1;
                if idle_streak > 1 {
                    return Err(Error::HandshakeFailed("engine stalled without I/O intent"));
                }
            }
            _ => idle_streak = 0,
        }
    }
}
