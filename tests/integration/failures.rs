use std::io::Write;

use crate::*;

use noisepump::{echo, handshake, pump, receive, ErrorKind};
use noisepump_core::Engine;

#[test]
fn client_vanishing_before_handshake_fails_server_handshake() {
    let (server_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, Vec::new()),
        SAFETY_TIMEOUT,
        |engine, conn| handshake(engine, conn),
    )
    .unwrap();

    drop(TcpStream::connect(addr).unwrap());

    let err = join(server).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed, "{err}");
}

#[test]
fn client_vanishing_mid_handshake_fails_server() {
    let (server_kp, _) = identity();
    let (client_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, Vec::new()),
        SAFETY_TIMEOUT,
        |engine, conn| handshake(engine, conn),
    )
    .unwrap();

    // Send the first handshake message only, then hang up.
    let (mut engine, mut conn) = connect(addr, &EngineConfig::client(client_kp, None)).unwrap();
    engine.advance_handshake();
    pump(&mut engine, &mut conn).unwrap();
    drop(conn);

    // The server may see the close on its next read, or a reset on writing
    // its reply.
    let err = join(server).unwrap_err();
    assert!(
        matches!(err.kind(), ErrorKind::HandshakeFailed | ErrorKind::IoFailure),
        "unexpected {err}"
    );
}

#[test]
fn client_rejects_unpinned_server_key() {
    let (server_kp, _) = identity();
    let (client_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, Vec::new()),
        SAFETY_TIMEOUT,
        |engine, conn| handshake(engine, conn),
    )
    .unwrap();

    let (mut engine, mut conn) =
        connect(addr, &EngineConfig::client(client_kp, Some([7u8; 32]))).unwrap();
    let err = handshake(&mut engine, &mut conn).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    assert_eq!(engine.peer_static(), None);

    // A failed engine stays failed and does no further I/O.
    let err = receive(&mut engine, &mut conn).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    drop(conn);

    // Whatever the server saw, it must not have completed.
    assert!(join(server).is_err());
}

#[test]
fn server_rejects_client_not_on_allow_list() {
    let (server_kp, _) = identity();
    let (client_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, vec![[9u8; 32]]),
        SAFETY_TIMEOUT,
        |engine, conn| handshake(engine, conn),
    )
    .unwrap();

    let (mut engine, mut conn) = connect(addr, &EngineConfig::client(client_kp, None)).unwrap();
    // The client finishes its side before the server has judged it.
    handshake(&mut engine, &mut conn).unwrap();

    let err = join(server).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HandshakeFailed);
    drop(conn);
}

#[test]
fn forged_record_after_handshake_is_malformed() {
    let (server_kp, _) = identity();
    let (client_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, Vec::new()),
        SAFETY_TIMEOUT,
        |engine, conn| echo(engine, conn),
    )
    .unwrap();

    let (mut engine, mut conn) = connect(addr, &EngineConfig::client(client_kp, None)).unwrap();
    handshake(&mut engine, &mut conn).unwrap();

    // A DataEnd record whose 32 bytes are not a valid ciphertext.
    let mut forged = vec![0x03, 0x00, 0x20];
    forged.extend_from_slice(&[0xAA; 32]);
    conn.get_mut().write_all(&forged).unwrap();

    let err = join(server).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRecord, "{err}");
}

#[test]
fn unknown_record_kind_is_malformed() {
    let (server_kp, _) = identity();
    let (client_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, Vec::new()),
        SAFETY_TIMEOUT,
        |engine, conn| echo(engine, conn),
    )
    .unwrap();

    let (mut engine, mut conn) = connect(addr, &EngineConfig::client(client_kp, None)).unwrap();
    handshake(&mut engine, &mut conn).unwrap();
    conn.get_mut().write_all(&[0x7f, 0x00, 0x01, 0x00]).unwrap();

    let err = join(server).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRecord, "{err}");
}

#[test]
fn silent_client_times_out_server_handshake() {
    let (server_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, Vec::new()),
        Duration::from_millis(200),
        |engine, conn| handshake(engine, conn),
    )
    .unwrap();

    // Connected but mute until the server has given up.
    let stream = TcpStream::connect(addr).unwrap();
    let err = join(server).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout, "{err}");
    drop(stream);
}

#[test]
fn expired_deadline_stops_handshake_before_any_io() {
    let (server_kp, _) = identity();
    let (addr, server) = spawn_server(
        EngineConfig::server(server_kp, Vec::new()),
        SAFETY_TIMEOUT,
        |engine, conn| {
            conn.set_timeout(Some(Duration::ZERO));
            std::thread::sleep(Duration::from_millis(5));
            handshake(engine, conn)
        },
    )
    .unwrap();

    let stream = TcpStream::connect(addr).unwrap();
    let err = join(server).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout, "{err}");
    drop(stream);
}
