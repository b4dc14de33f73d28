//! Configuration system for Noisepump.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $NOISEPUMP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/noisepump/config.toml
//!   3. ~/.config/noisepump/config.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::{parse_key_hex, KeyError};
use crate::wire::{DEFAULT_PORT, DEFAULT_SCRATCH_CAPACITY};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoisepumpConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub trust: TrustConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Server: path to the hex-encoded X25519 private key. Generated on
    /// first run.
    pub keypair_path: PathBuf,
    /// Client: optional static key. Empty = fresh key per run.
    pub client_keypair_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server: ignored (binds all interfaces). Client: host to connect to.
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Client trust anchor: the server's public key (hex). Empty = any server.
    pub server_public_key: String,
    /// Client public keys (hex) the server accepts. Empty = any client.
    pub client_public_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bytes staged per socket read.
    pub scratch_capacity: usize,
    /// Socket read/write timeout and per-phase deadline. 0 = none.
    pub io_timeout_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            keypair_path: config_dir().join("keypair"),
            client_keypair_path: PathBuf::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            io_timeout_secs: 0,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("noisepump")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid trust key {0:?}: {1}")]
    BadTrustKey(String, KeyError),
    #[error("scratch_capacity must be non-zero")]
    ZeroScratch,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl NoisepumpConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            NoisepumpConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("NOISEPUMP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&NoisepumpConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply NOISEPUMP_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("NOISEPUMP_NETWORK__HOST") {
            self.network.host = v;
        }
        if let Ok(v) = std::env::var("NOISEPUMP_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Ok(v) = std::env::var("NOISEPUMP_SESSION__IO_TIMEOUT_SECS") {
            if let Ok(s) = v.parse() {
                self.session.io_timeout_secs = s;
            }
        }
        if let Ok(v) = std::env::var("NOISEPUMP_TRUST__SERVER_PUBLIC_KEY") {
            self.trust.server_public_key = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.scratch_capacity == 0 {
            return Err(ConfigError::ZeroScratch);
        }
        self.trust_anchor()?;
        self.allowed_clients()?;
        Ok(())
    }

    /// The pinned server key, if one is configured.
    pub fn trust_anchor(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        let text = self.trust.server_public_key.trim();
        if text.is_empty() {
            return Ok(None);
        }
        parse_key_hex(text)
            .map(Some)
            .map_err(|e| ConfigError::BadTrustKey(text.to_string(), e))
    }

    pub fn allowed_clients(&self) -> Result<Vec<[u8; 32]>, ConfigError> {
        self.trust
            .client_public_keys
            .iter()
            .map(|k| parse_key_hex(k.trim()).map_err(|e| ConfigError::BadTrustKey(k.clone(), e)))
            .collect()
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        match self.session.io_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
