//! noisepump: drives a non-blocking secure-transport engine over a
//! blocking byte stream.
//!
//! The pump turns one engine intent into one socket call. The handshake
//! driver, the exchange driver and the echo loop are built on top of it and
//! take the engine and the connection by `&mut`; the caller owns both.

pub mod connection;
pub mod echo;
pub mod error;
pub mod exchange;
pub mod handshake;
pub mod pump;

#[cfg(test)]
mod testing;

pub use connection::{Connection, ScratchBuffer};
pub use echo::{echo, EchoStats};
pub use error::{Error, ErrorKind, Result};
pub use exchange::{receive, send, Payload};
pub use handshake::handshake;
pub use pump::{pump, PumpOutcome};
