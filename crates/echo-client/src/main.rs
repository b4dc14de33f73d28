//! echo-client sends one message over Noise_XX and prints the echo.
//!
//! Usage: echo-client [MESSAGE]   (default "test")

use std::net::TcpStream;
use std::process::ExitCode;

use anyhow::{Context, Result};

use noisepump::error::os_error_code;
use noisepump::{handshake, receive, send, Connection};
use noisepump_core::config::NoisepumpConfig;
use noisepump_core::crypto::{fingerprint, Keypair};
use noisepump_core::{EngineConfig, NoiseEngine};

fn main() -> ExitCode {
    // stdout carries the echoed message only.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("echo-client failed: {e:#}");
            let code = os_error_code(e.as_ref()).unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run() -> Result<()> {
    let message = std::env::args().nth(1).unwrap_or_else(|| "test".to_string());

    let config = NoisepumpConfig::load().context("failed to load config")?;
    let keypair = if config.identity.client_keypair_path.as_os_str().is_empty() {
        Keypair::generate()
    } else {
        Keypair::load_or_generate(&config.identity.client_keypair_path)
            .context("failed to load client keypair")?
    };

    let trust_anchor = config.trust_anchor()?;
    if trust_anchor.is_none() {
        tracing::warn!("no server key pinned, accepting any server");
    }
    let engine_config = EngineConfig::client(keypair, trust_anchor);

    let host = config.network.host.as_str();
    let port = config.network.port;
    let stream = TcpStream::connect((host, port))
        .with_context(|| format!("failed to connect to {host}:{port}"))?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(config.io_timeout())?;
    stream.set_write_timeout(config.io_timeout())?;
    tracing::info!(host, port, "connected");

    let mut engine = NoiseEngine::new(&engine_config, Some(host))?;
    let mut conn = Connection::with_capacity(stream, config.session.scratch_capacity);
    conn.set_timeout(config.io_timeout());

    handshake(&mut engine, &mut conn).context("handshake failed")?;
    if let Some(key) = engine.peer_static() {
        tracing::info!(
            server_key = hex::encode(key),
            fingerprint = fingerprint(key),
            "channel established"
        );
    }

    send(&mut engine, &mut conn, message.as_bytes()).context("send failed")?;
    let reply = receive(&mut engine, &mut conn).context("receive failed")?;
    println!("RECEIVED ->{}<-", reply.to_text());
    Ok(())
}
