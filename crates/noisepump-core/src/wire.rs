//! Noisepump record format: the framing the Noise engine puts on the stream.
//!
//! The pump never looks at these bytes. They matter only to the engine on
//! each end of the connection, which must agree on every field below.
//!
//! All on-wire types are #[repr(C, packed)] and use zerocopy derives for
//! allocation-free parsing. There is no unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Record Header ─────────────────────────────────────────────────────────────

/// Prefix of every record on the stream.
///
///   [kind u8] [length u16 BE] [Noise message (length bytes)]
///
/// Wire size: 3 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RecordHeader {
    /// One of the `RecordKind` discriminants.
    pub kind: u8,

    /// Length of the Noise message that follows, big-endian.
    pub length: [u8; 2],
}

assert_eq_size!(RecordHeader, [u8; RECORD_HEADER_LEN]);

impl RecordHeader {
    pub fn new(kind: RecordKind, length: usize) -> Result<Self, WireError> {
        if length > MAX_NOISE_MESSAGE {
            return Err(WireError::RecordTooLarge(length));
        }
        Ok(Self {
            kind: kind.into(),
            length: (length as u16).to_be_bytes(),
        })
    }

    /// Length of the record body in bytes.
    pub fn body_len(&self) -> usize {
        u16::from_be_bytes(self.length) as usize
    }
}

// ── Record Kind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Noise handshake message. Only valid before the session is established.
    Handshake = 0x01,

    /// Application data fragment; more fragments of the same message follow.
    Data = 0x02,

    /// Final fragment of an application message.
    DataEnd = 0x03,
}

impl TryFrom<u8> for RecordKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(RecordKind::Handshake),
            0x02 => Ok(RecordKind::Data),
            0x03 => Ok(RecordKind::DataEnd),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

impl From<RecordKind> for u8 {
    fn from(k: RecordKind) -> u8 {
        k as u8
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

pub const RECORD_HEADER_LEN: usize = 3;

/// Largest Noise message snow will produce or accept.
pub const MAX_NOISE_MESSAGE: usize = 65535;

/// Poly1305 tag appended to every transport message.
pub const TAG_LEN: usize = 16;

/// Largest plaintext carried by one Data/DataEnd record.
/// Bigger application messages are split across several records.
pub const MAX_FRAGMENT: usize = 16 * 1024;

/// Default capacity of the socket scratch buffer.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 4096;

/// Default TCP port of the echo server.
pub const DEFAULT_PORT: u16 = 4433;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown record kind: 0x{0:02x}")]
    UnknownKind(u8),

    #[error("record body of {0} bytes exceeds maximum {}", MAX_NOISE_MESSAGE)]
    RecordTooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
