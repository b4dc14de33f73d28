//! Application data over an established channel.
//!
//! Message boundaries come from the engine's completion flag, never from
//! how the bytes happened to be split across socket reads.

use std::borrow::Cow;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::ops::Deref;

use noisepump_core::{Engine, EngineError, IoIntent};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::handshake::handshake;
use crate::pump::{pump, PumpOutcome};

/// One complete decrypted application message.
///
/// Exactly as long as the message the engine delivered; there is no
/// trailing terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Box<[u8]>);

impl Payload {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0.into_vec()
    }

    /// Lossy UTF-8 view for display.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hand `payload` to the engine and pump until its ciphertext is written.
pub fn send<E, S>(engine: &mut E, conn: &mut Connection<S>, payload: &[u8]) -> Result<()>
where
    E: Engine + ?Sized,
    S: Read + Write,
{
    // Finishes the handshake first if the caller skipped it.
    handshake(engine, conn)?;
    engine.stage_outgoing(payload).map_err(|e| match e {
        EngineError::Closed => Error::PeerClosed,
        e => Error::Engine(e),
    })?;

    let mut pumps = 0usize;
    while engine.intent() == Some(IoIntent::WantWrite) {
        conn.check_deadline()?;
        pump(engine, conn)?;
        pumps += 1;
    }
    tracing::trace!(len = payload.len(), pumps, "payload sent");
    Ok(())
}

/// Read until the engine has delivered one complete message.
///
/// Returns [`Error::PeerClosed`] when the stream ends between messages.
pub fn receive<E, S>(engine: &mut E, conn: &mut Connection<S>) -> Result<Payload>
where
    E: Engine + ?Sized,
    S: Read + Write,
{
    handshake(engine, conn)?;

    let mut message = Vec::new();
    loop {
        let (_, scratch) = conn.parts();
        let buf = scratch.as_mut();
        let n = engine.decrypted_length(buf).map_err(Error::MalformedRecord)?;
        message.extend_from_slice(&buf[..n]);

        if engine.message_complete() {
            tracing::trace!(len = message.len(), "payload received");
            return Ok(Payload(message.into_boxed_slice()));
        }
        if n > 0 {
            continue;
        }

        conn.check_deadline()?;
        match pump(engine, conn)? {
            PumpOutcome::Read(0) | PumpOutcome::Idle if message.is_empty() => {
                return Err(Error::PeerClosed)
            }
            PumpOutcome::Read(0) | PumpOutcome::Idle => {
                return Err(Error::Io(IoErrorKind::UnexpectedEof.into()))
            }
            _ => {}
        }
    }
}
