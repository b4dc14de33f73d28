//! noisepump-core: shared types, record format, key material, and the
//! Noise_XX transport engine. The pump crate depends on this one.

pub mod config;
pub mod crypto;
pub mod engine;
pub mod noise;
pub mod wire;

pub use engine::{Engine, EngineError, HandshakeStatus, IoIntent};
pub use noise::{EngineConfig, NoiseEngine, Role};
