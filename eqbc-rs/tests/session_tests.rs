//! Session behaviour against real loopback servers.
//!
//! Each test binds a `TcpListener` on an ephemeral port, scripts the server
//! side in a spawned task, and drives a `Session` from the test body.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use eqbc::framer::OutboundMessage;
use eqbc::registry::{ConnectionRegistry, ConnectionTarget};
use eqbc::session::{Session, SessionEvent, SessionState};
use eqbc::store::{shared, MemoryStore};

// ── Helpers ───────────────────────────────────────────────────────────────────

const STEP: Duration = Duration::from_secs(5);

fn session() -> Session {
    Session::new(ConnectionRegistry::new(shared(MemoryStore::new())))
}

async fn listener() -> (TcpListener, u16) {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = l.local_addr().unwrap().port();
    (l, port)
}

async fn next(s: &mut Session) -> SessionEvent {
    timeout(STEP, s.next_event())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

/// Read exactly `n` bytes from `sock`.
async fn read_n(sock: &mut tokio::net::TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    sock.read_exact(&mut buf).await.unwrap();
    buf
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_lines_then_clean_close() {
    let (l, port) = listener().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = l.accept().await.unwrap();
        let login = read_n(&mut sock, "LOGIN=bob;\n".len()).await;
        sock.write_all(b"-- Welcome\n\n[bob] hi\n").await.unwrap();
        login
    });

    let mut s = session();
    s.connect(ConnectionTarget::new("127.0.0.1", port, "bob")).await;
    assert_eq!(s.state(), SessionState::Authenticated);

    assert_eq!(next(&mut s).await, SessionEvent::Line("-- Welcome".into()));
    assert_eq!(next(&mut s).await, SessionEvent::Line("".into()));
    assert_eq!(next(&mut s).await, SessionEvent::Line("[bob] hi".into()));
    assert_eq!(next(&mut s).await, SessionEvent::Disconnected);
    assert_eq!(s.state(), SessionState::Disconnected);
    assert_eq!(s.try_next_event(), None);

    assert_eq!(server.await.unwrap(), b"LOGIN=bob;\n");
}

#[tokio::test]
async fn connect_records_last_target_and_reconnects() {
    let (l, port) = listener().await;
    let server = tokio::spawn(async move {
        let mut logins = Vec::new();
        for _ in 0..2 {
            let (mut sock, _) = l.accept().await.unwrap();
            logins.push(read_n(&mut sock, "LOGIN=amy;\n".len()).await);
        }
        logins
    });

    let mut s = session();
    let target = ConnectionTarget::new("127.0.0.1", port, "amy");
    s.connect(target.clone()).await;
    assert_eq!(s.registry().load(), Some(target.clone()));

    s.disconnect().await;
    assert_eq!(s.state(), SessionState::Disconnected);
    assert!(s.reconnect_to_last().await);
    assert_eq!(s.state(), SessionState::Authenticated);
    assert_eq!(s.target(), Some(&target));

    let logins = server.await.unwrap();
    assert_eq!(logins, vec![b"LOGIN=amy;\n".to_vec(), b"LOGIN=amy;\n".to_vec()]);
}

#[tokio::test]
async fn sends_are_framed_in_order() {
    let (l, port) = listener().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = l.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let mut s = session();
    s.connect(ConnectionTarget::new("127.0.0.1", port, "bob")).await;
    assert!(s.send(&OutboundMessage::command("TELL Cleric //sit")).await);
    assert!(s.send(&OutboundMessage::chat("hello")).await);
    assert!(s.send(&OutboundMessage::command("MSGALL //stand")).await);
    s.disconnect().await;

    assert_eq!(
        server.await.unwrap(),
        b"LOGIN=bob;\n\tTELL Cleric //sit\nhello\n\tMSGALL //stand\n"
    );
    assert!(!s.send(&OutboundMessage::chat("after")).await);
}

#[tokio::test]
async fn reconnect_closes_previous_socket_first() {
    let (old_l, old_port) = listener().await;
    let (new_l, new_port) = listener().await;

    // The old server reports how much it read before seeing EOF.
    let old_server = tokio::spawn(async move {
        let (mut sock, _) = old_l.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let mut s = session();
    s.connect(ConnectionTarget::new("127.0.0.1", old_port, "bob")).await;
    assert_eq!(s.state(), SessionState::Authenticated);

    let new_server = tokio::spawn(async move {
        let (mut sock, _) = new_l.accept().await.unwrap();
        let login = read_n(&mut sock, "LOGIN=amy;\n".len()).await;
        sock.write_all(b"fresh\n").await.unwrap();
        login
    });

    s.connect(ConnectionTarget::new("127.0.0.1", new_port, "amy")).await;

    // The old connection is already closed by the time connect() returns.
    let old = timeout(STEP, old_server).await.expect("old socket left open").unwrap();
    assert_eq!(old, b"LOGIN=bob;\n");

    assert_eq!(next(&mut s).await, SessionEvent::Line("fresh".into()));
    assert_eq!(new_server.await.unwrap(), b"LOGIN=amy;\n");
    assert_eq!(s.target().map(|t| t.username.as_str()), Some("amy"));
}

#[tokio::test]
async fn superseded_session_lines_never_surface() {
    let (old_l, old_port) = listener().await;
    let (new_l, new_port) = listener().await;

    let old_server = tokio::spawn(async move {
        let (mut sock, _) = old_l.accept().await.unwrap();
        let _ = read_n(&mut sock, "LOGIN=bob;\n".len()).await;
        sock.write_all(b"stale one\nstale two\n").await.unwrap();
        // Hold the socket until the client drops it.
        let mut rest = Vec::new();
        let _ = sock.read_to_end(&mut rest).await;
    });

    let mut s = session();
    s.connect(ConnectionTarget::new("127.0.0.1", old_port, "bob")).await;
    // Let the old read loop queue its lines.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let new_server = tokio::spawn(async move {
        let (mut sock, _) = new_l.accept().await.unwrap();
        let _ = read_n(&mut sock, "LOGIN=bob;\n".len()).await;
        sock.write_all(b"current\n").await.unwrap();
    });
    s.connect(ConnectionTarget::new("127.0.0.1", new_port, "bob")).await;

    assert_eq!(next(&mut s).await, SessionEvent::Line("current".into()));
    new_server.await.unwrap();
    old_server.await.unwrap();
}

#[tokio::test]
async fn sends_after_peer_close_keep_delivered_lines() {
    let (l, port) = listener().await;
    let server = tokio::spawn(async move {
        let (mut sock, _) = l.accept().await.unwrap();
        let _ = read_n(&mut sock, "LOGIN=bob;\n".len()).await;
        sock.write_all(b"one\ntwo\nthree\n").await.unwrap();
    });

    let mut s = session();
    s.connect(ConnectionTarget::new("127.0.0.1", port, "bob")).await;
    server.await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Whether these writes fail depends on when the peer's reset lands;
    // the events must be the same either way.
    for _ in 0..3 {
        s.send(&OutboundMessage::chat("hi")).await;
    }

    let mut events = Vec::new();
    loop {
        let ev = next(&mut s).await;
        let done = ev == SessionEvent::Disconnected;
        events.push(ev);
        if done {
            break;
        }
    }
    assert_eq!(
        events,
        vec![
            SessionEvent::Line("one".into()),
            SessionEvent::Line("two".into()),
            SessionEvent::Line("three".into()),
            SessionEvent::Disconnected,
        ]
    );
    assert_eq!(s.state(), SessionState::Disconnected);
    assert_eq!(s.try_next_event(), None);
}

#[tokio::test]
async fn refused_connect_is_one_diagnostic() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };

    let mut s = session();
    s.connect(ConnectionTarget::new("127.0.0.1", port, "bob")).await;
    assert_eq!(s.state(), SessionState::Disconnected);

    match next(&mut s).await {
        SessionEvent::Diagnostic(d) => assert!(d.starts_with("Error: "), "{d}"),
        other => panic!("expected diagnostic, got {other:?}"),
    }
    assert_eq!(s.try_next_event(), None);
    assert!(!s.send(&OutboundMessage::chat("dropped")).await);
}
