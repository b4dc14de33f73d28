//! Key material for Noisepump.
//!
//! Static X25519 keypairs are managed via x25519-dalek for explicit key
//! control; the Noise engine hands the raw private key to snow.
//! BLAKE3 provides short fingerprints for logging public keys.
//!
//! All key material derives ZeroizeOnDrop and is wiped from memory when dropped.
//! There is no unsafe code in this module.

use std::path::{Path, PathBuf};

use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ── BLAKE3 ────────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Short, log-friendly fingerprint of a public key: the first 8 bytes of
/// its BLAKE3 hash, hex-encoded.
pub fn fingerprint(public: &[u8]) -> String {
    hex::encode(&hash(public)[..8])
}

// ── Keypair ───────────────────────────────────────────────────────────────────

/// A long-term static X25519 keypair.
///
/// The server's keypair is its identity: clients pin its public key as their
/// trust anchor. The private key never leaves this struct except through
/// [`Keypair::private_bytes`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    /// Private key. Zeroized on drop, never exposed directly.
    private: Zeroizing<[u8; 32]>,
    pub public: [u8; 32],
}

impl Keypair {
    /// Generate a new random X25519 keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(secret.to_bytes()),
            public: *public.as_bytes(),
        }
    }

    /// Reconstruct a keypair from stored private key bytes.
    /// The public key is derived deterministically from the private key.
    pub fn from_private(private_bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private_bytes);
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(private_bytes),
            public: *public.as_bytes(),
        }
    }

    /// Serialize the private key for persistent storage.
    pub fn private_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(*self.private)
    }

    /// Load a hex-encoded private key from `path`.
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let text = Zeroizing::new(
            std::fs::read_to_string(path).map_err(|e| KeyError::Read(path.to_path_buf(), e))?,
        );
        let bytes = parse_key_hex(text.trim())
            .map_err(|e| KeyError::Parse(path.to_path_buf(), Box::new(e)))?;
        Ok(Self::from_private(bytes))
    }

    /// Load the keypair at `path`, or generate one and write it there.
    ///
    /// The file is created with mode 0600 on unix.
    pub fn load_or_generate(path: &Path) -> Result<Self, KeyError> {
        if path.exists() {
            return Self::load(path);
        }

        let keypair = Self::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KeyError::Write(path.to_path_buf(), e))?;
        }
        let text = Zeroizing::new(hex::encode(*keypair.private));
        write_private(path, text.as_bytes()).map_err(|e| KeyError::Write(path.to_path_buf(), e))?;
        tracing::info!(path = %path.display(), "generated new keypair");
        Ok(keypair)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

/// Parse a 32-byte key from 64 hex characters.
pub fn parse_key_hex(text: &str) -> Result<[u8; 32], KeyError> {
    let bytes = hex::decode(text).map_err(KeyError::Hex)?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| KeyError::Length(v.len()))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to write key {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("invalid key in {0}: {1}")]
    Parse(PathBuf, Box<KeyError>),

    #[error("key is not valid hex: {0}")]
    Hex(hex::FromHexError),

    #[error("key must be 32 bytes, got {0}")]
    Length(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
