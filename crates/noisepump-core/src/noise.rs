//! Noise_XX secure-transport engine.
//!
//! A sans-I/O state machine: ciphertext goes in through `notify_read`,
//! comes out through `output_chunk`/`notify_written`, and the engine reports
//! what it needs next through `intent`. snow drives the handshake and the
//! transport ciphers; this module adds record framing and trust checks.
//!
//! Uses the stateful TransportState: on TCP records arrive
//! exactly once and in order, so nonces stay implicit.

use bytes::{Buf, BytesMut};
use snow::{Builder, HandshakeState, TransportState};
use zerocopy::{AsBytes, FromBytes};

use crate::crypto::{fingerprint, Keypair};
use crate::engine::{Engine, EngineError, HandshakeStatus, IoIntent};
use crate::wire::{
    RecordHeader, RecordKind, MAX_FRAGMENT, MAX_NOISE_MESSAGE, RECORD_HEADER_LEN, TAG_LEN,
};

/// The Noise protocol pattern Noisepump uses.
///
/// Noise_XX: mutual authentication, both static keys transmitted encrypted.
const NOISE_PATTERN: &str = "Noise_XX_25519_ChaChaPoly_BLAKE2s";

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Static trust configuration an engine is built from.
///
/// Build one per process and create a fresh [`NoiseEngine`] per connection.
pub struct EngineConfig {
    role: Role,
    keypair: Keypair,
    /// Client: the only server key accepted. Server: the client keys
    /// accepted; empty accepts any client.
    trusted: Vec<[u8; 32]>,
}

impl EngineConfig {
    /// Client configuration. `trust_anchor` pins the server's static key;
    /// without it any server is accepted.
    pub fn client(keypair: Keypair, trust_anchor: Option<[u8; 32]>) -> Self {
        Self {
            role: Role::Client,
            keypair,
            trusted: trust_anchor.into_iter().collect(),
        }
    }

    /// Server configuration. An empty `allowed_clients` accepts any client.
    pub fn server(keypair: Keypair, allowed_clients: Vec<[u8; 32]>) -> Self {
        Self {
            role: Role::Server,
            keypair,
            trusted: allowed_clients,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.keypair.public
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

enum State {
    Handshake(Box<HandshakeState>),
    Transport(Box<TransportState>),
    Failed,
}

/// Noise_XX engine for one connection.
pub struct NoiseEngine {
    role: Role,
    state: State,
    trusted: Vec<[u8; 32]>,
    peer_name: Option<String>,
    peer_static: Option<[u8; 32]>,

    /// Framed ciphertext waiting for the socket.
    outgoing: BytesMut,
    /// Ciphertext from the socket not yet parsed into records.
    incoming: BytesMut,
    /// Decrypted bytes of the current message not yet handed out.
    plaintext: BytesMut,
    /// Scratch space for one Noise message.
    message: Vec<u8>,

    /// The DataEnd fragment of the current message has been decrypted.
    end_decrypted: bool,
    /// Every byte of the current message has been handed out.
    complete: bool,
    eof: bool,
    malformed: bool,
}

impl NoiseEngine {
    /// Create an engine for one connection. `peer_name` only labels logs.
    pub fn new(config: &EngineConfig, peer_name: Option<&str>) -> Result<Self, EngineError> {
        let params = NOISE_PATTERN.parse().map_err(|_| EngineError::BadPattern)?;
        let private = config.keypair.private_bytes();
        let builder = Builder::new(params).local_private_key(&*private);
        let handshake = match config.role {
            Role::Client => builder.build_initiator()?,
            Role::Server => builder.build_responder()?,
        };

        Ok(Self {
            role: config.role,
            state: State::Handshake(Box::new(handshake)),
            trusted: config.trusted.clone(),
            peer_name: peer_name.map(str::to_owned),
            peer_static: None,
            outgoing: BytesMut::new(),
            incoming: BytesMut::new(),
            plaintext: BytesMut::new(),
            message: vec![0u8; MAX_NOISE_MESSAGE],
            end_decrypted: false,
            complete: false,
            eof: false,
            malformed: false,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The authenticated static key of the peer, once the handshake is done.
    pub fn peer_static(&self) -> Option<&[u8; 32]> {
        self.peer_static.as_ref()
    }

    fn peer(&self) -> &str {
        self.peer_name.as_deref().unwrap_or("-")
    }

    fn fail(&mut self, error: EngineError) -> HandshakeStatus {
        tracing::warn!(peer = self.peer(), role = ?self.role, error = %error, "handshake failed");
        self.state = State::Failed;
        HandshakeStatus::Failed
    }

    fn push_record(&mut self, kind: RecordKind, len: usize) -> Result<(), EngineError> {
        let header = RecordHeader::new(kind, len)
            .map_err(|e| EngineError::MalformedRecord(e.to_string()))?;
        self.outgoing.extend_from_slice(header.as_bytes());
        self.outgoing.extend_from_slice(&self.message[..len]);
        Ok(())
    }

    /// Split one complete record off `incoming`, if one is buffered.
    fn take_record(&mut self) -> Result<Option<(RecordKind, BytesMut)>, EngineError> {
        let Some(header) = self
            .incoming
            .get(..RECORD_HEADER_LEN)
            .and_then(|b| RecordHeader::read_from(b))
        else {
            return Ok(None);
        };
        let kind = RecordKind::try_from(header.kind)
            .map_err(|e| EngineError::MalformedRecord(e.to_string()))?;
        if self.incoming.len() < RECORD_HEADER_LEN + header.body_len() {
            return Ok(None);
        }
        self.incoming.advance(RECORD_HEADER_LEN);
        Ok(Some((kind, self.incoming.split_to(header.body_len()))))
    }

    /// One handshake step without I/O: write our message if it is our turn,
    /// otherwise consume one buffered handshake record.
    /// Returns false when nothing could be done.
    fn handshake_step(&mut self) -> Result<bool, EngineError> {
        let State::Handshake(hs) = &mut self.state else {
            return Ok(false);
        };

        if hs.is_my_turn() {
            let len = hs.write_message(&[], &mut self.message)?;
            self.push_record(RecordKind::Handshake, len)?;
            tracing::trace!(peer = self.peer(), len, "queued handshake message");
            return Ok(true);
        }

        let Some((kind, body)) = self.take_record()? else {
            return Ok(false);
        };
        if kind != RecordKind::Handshake {
            return Err(EngineError::MalformedRecord(format!(
                "{kind:?} record during handshake"
            )));
        }
        let State::Handshake(hs) = &mut self.state else {
            return Ok(false);
        };
        hs.read_message(&body, &mut self.message)?;
        tracing::trace!(peer = self.peer(), len = body.len(), "read handshake message");
        Ok(true)
    }

    fn finish_handshake(&mut self) -> Result<(), EngineError> {
        let State::Handshake(hs) = std::mem::replace(&mut self.state, State::Failed) else {
            return Err(EngineError::NotEstablished);
        };
        let transport = hs.into_transport_mode()?;
        let remote: [u8; 32] = transport
            .get_remote_static()
            .and_then(|k| k.try_into().ok())
            .ok_or(EngineError::NotEstablished)?;

        if !self.trusted.is_empty() && !self.trusted.contains(&remote) {
            return Err(EngineError::UntrustedPeer(fingerprint(&remote)));
        }

        tracing::debug!(
            peer = self.peer(),
            role = ?self.role,
            peer_key = fingerprint(&remote),
            "secure channel established"
        );
        self.peer_static = Some(remote);
        self.state = State::Transport(Box::new(transport));
        Ok(())
    }

    /// Decrypt one buffered application record into `plaintext`.
    /// Returns false when no complete record is buffered.
    fn decrypt_record(&mut self) -> Result<bool, EngineError> {
        if !matches!(self.state, State::Transport(_)) {
            return Err(EngineError::NotEstablished);
        }
        let Some((kind, body)) = self.take_record()? else {
            return Ok(false);
        };
        let State::Transport(transport) = &mut self.state else {
            return Err(EngineError::NotEstablished);
        };
        if kind == RecordKind::Handshake {
            return Err(EngineError::MalformedRecord(
                "handshake record after establishment".into(),
            ));
        }
        let len = transport.read_message(&body, &mut self.message)?;
        self.plaintext.extend_from_slice(&self.message[..len]);
        self.end_decrypted = kind == RecordKind::DataEnd;
        Ok(true)
    }
}

impl Engine for NoiseEngine {
    fn intent(&self) -> Option<IoIntent> {
        if !self.outgoing.is_empty() {
            return Some(IoIntent::WantWrite);
        }
        if self.eof || self.malformed {
            return None;
        }
        match &self.state {
            State::Handshake(hs) if hs.is_my_turn() => None,
            State::Handshake(hs) if hs.is_handshake_finished() => None,
            State::Handshake(_) => {
                if self.has_full_record() {
                    None
                } else {
                    Some(IoIntent::WantRead)
                }
            }
            State::Transport(_) => Some(IoIntent::WantRead),
            State::Failed => None,
        }
    }

    fn output_chunk(&self) -> &[u8] {
        &self.outgoing
    }

    fn notify_written(&mut self, n: usize) {
        let n = n.min(self.outgoing.len());
        self.outgoing.advance(n);
    }

    fn notify_read(&mut self, data: &[u8]) {
        if data.is_empty() {
            tracing::trace!(peer = self.peer(), "end of stream");
            self.eof = true;
        } else {
            self.incoming.extend_from_slice(data);
        }
    }

    fn advance_handshake(&mut self) -> HandshakeStatus {
        loop {
            match &self.state {
                State::Failed => return HandshakeStatus::Failed,
                State::Transport(_) if self.outgoing.is_empty() => {
                    return HandshakeStatus::Established
                }
                State::Transport(_) => return HandshakeStatus::InProgress,
                State::Handshake(hs) if hs.is_handshake_finished() => {
                    if let Err(e) = self.finish_handshake() {
                        return self.fail(e);
                    }
                }
                State::Handshake(_) => match self.handshake_step() {
                    Ok(true) => {}
                    Ok(false) if self.eof => {
                        return self.fail(EngineError::MalformedRecord(
                            "peer closed during handshake".into(),
                        ))
                    }
                    Ok(false) => return HandshakeStatus::InProgress,
                    Err(e) => return self.fail(e),
                },
            }
        }
    }

    fn status(&self) -> HandshakeStatus {
        match &self.state {
            State::Handshake(_) => HandshakeStatus::InProgress,
            State::Transport(_) if self.outgoing.is_empty() => HandshakeStatus::Established,
            State::Transport(_) => HandshakeStatus::InProgress,
            State::Failed => HandshakeStatus::Failed,
        }
    }

    fn decrypted_length(&mut self, out: &mut [u8]) -> Result<usize, EngineError> {
        if self.malformed {
            return Err(EngineError::MalformedRecord("engine previously failed".into()));
        }
        if self.complete {
            self.complete = false;
            self.end_decrypted = false;
        }

        // Empty Data fragments carry nothing; keep going until a record
        // yields bytes or ends the message.
        while self.plaintext.is_empty() && !self.end_decrypted {
            match self.decrypt_record() {
                Ok(true) => {}
                Ok(false) => break,
                Err(EngineError::NotEstablished) => return Err(EngineError::NotEstablished),
                Err(e) => {
                    tracing::warn!(peer = self.peer(), error = %e, "dropping malformed record");
                    self.malformed = true;
                    return Err(match e {
                        EngineError::Noise(e) => EngineError::MalformedRecord(e.to_string()),
                        other => other,
                    });
                }
            }
        }

        let n = out.len().min(self.plaintext.len());
        self.plaintext.copy_to_slice(&mut out[..n]);
        self.complete = self.end_decrypted && self.plaintext.is_empty();
        Ok(n)
    }

    fn message_complete(&self) -> bool {
        self.complete
    }

    fn stage_outgoing(&mut self, payload: &[u8]) -> Result<(), EngineError> {
        if self.eof || self.malformed {
            return Err(EngineError::Closed);
        }
        if !matches!(self.state, State::Transport(_)) {
            return Err(EngineError::NotEstablished);
        }

        let mut fragments = payload.chunks(MAX_FRAGMENT).peekable();
        if fragments.peek().is_none() {
            // An empty message is still one DataEnd record.
            return self.seal(RecordKind::DataEnd, &[]);
        }
        while let Some(fragment) = fragments.next() {
            let kind = if fragments.peek().is_some() {
                RecordKind::Data
            } else {
                RecordKind::DataEnd
            };
            self.seal(kind, fragment)?;
        }
        Ok(())
    }
}

impl NoiseEngine {
    fn has_full_record(&self) -> bool {
        self.incoming
            .get(..RECORD_HEADER_LEN)
            .and_then(|b| RecordHeader::read_from(b))
            .is_some_and(|h| self.incoming.len() >= RECORD_HEADER_LEN + h.body_len())
    }

    fn seal(&mut self, kind: RecordKind, fragment: &[u8]) -> Result<(), EngineError> {
        debug_assert!(fragment.len() + TAG_LEN <= MAX_NOISE_MESSAGE);
        let State::Transport(transport) = &mut self.state else {
            return Err(EngineError::NotEstablished);
        };
        let len = transport.write_message(fragment, &mut self.message)?;
        self.push_record(kind, len)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
