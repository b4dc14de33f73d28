//! echo-server accepts one peer and echoes its messages back over Noise_XX.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::process::ExitCode;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};

use noisepump::error::os_error_code;
use noisepump::{echo, handshake, Connection};
use noisepump_core::config::NoisepumpConfig;
use noisepump_core::crypto::{fingerprint, Keypair};
use noisepump_core::{EngineConfig, NoiseEngine};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("echo-server failed: {e:#}");
            let code = os_error_code(e.as_ref()).unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run() -> Result<()> {
    if let Err(e) = NoisepumpConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = NoisepumpConfig::load().context("failed to load config")?;

    let keypair = Keypair::load_or_generate(&config.identity.keypair_path)
        .context("failed to load server keypair")?;
    tracing::info!(
        public_key = hex::encode(keypair.public),
        fingerprint = fingerprint(&keypair.public),
        "server identity ready"
    );
    let engine_config = EngineConfig::server(keypair, config.allowed_clients()?);

    let listener = bind(config.network.port)?;
    tracing::info!(port = config.network.port, "echo-server listening");

    let (stream, peer) = listener.accept().context("accept failed")?;
    tracing::info!(%peer, "peer connected");
    stream.set_nodelay(true)?;
    stream.set_read_timeout(config.io_timeout())?;
    stream.set_write_timeout(config.io_timeout())?;

    let peer_name = peer.to_string();
    let mut engine = NoiseEngine::new(&engine_config, Some(&peer_name))?;
    let mut conn = Connection::with_capacity(stream, config.session.scratch_capacity);

    // The deadline bounds the handshake only; an idle echo session is bounded
    // by the socket timeouts.
    conn.set_timeout(config.io_timeout());
    handshake(&mut engine, &mut conn).context("handshake failed")?;
    conn.set_deadline(None);

    if let Some(key) = engine.peer_static() {
        tracing::info!(
            client_key = hex::encode(key),
            fingerprint = fingerprint(key),
            "channel established"
        );
    }

    let stats = echo(&mut engine, &mut conn).context("echo session failed")?;
    tracing::info!(
        messages = stats.messages,
        bytes = stats.bytes,
        "peer closed, shutting down"
    );
    Ok(())
}

/// Listen on all interfaces with address reuse and a backlog of one.
fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .context("failed to create socket")?;
    socket
        .set_reuse_address(true)
        .context("failed to set SO_REUSEADDR")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind {addr}"))?;
    socket.listen(1).context("failed to listen")?;
    Ok(socket.into())
}
