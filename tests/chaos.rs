//! Chaos tests
//!
//! Scripted raw-socket servers that misbehave at the byte level: trickled
//! writes, corrupt length prefixes, events interleaved with responses and
//! connections dropped mid-handshake.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use squad_rcon::core::packet::{
    decode_as, Packet, PacketType, Role, AUTH_REQUEST_ID, COMMAND_REQUEST_ID,
    TERMINATOR_REQUEST_ID,
};
use squad_rcon::{ErrorKind, RconConfig, RconError, Session, SessionState, Subscription, TypedEvent};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

const EOS: &str = "0002a10186d9424aa7b0d7b2f0e1a7c3";

/// Serve exactly one connection with `script`
async fn scripted_server<F, Fut>(script: F) -> SocketAddr
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(stream).await;
    });
    addr
}

fn config(addr: SocketAddr) -> RconConfig {
    let mut config = RconConfig::new("127.0.0.1", addr.port(), "secret");
    config.auto_reconnect = false;
    config.keepalive_interval = Duration::from_secs(60);
    config.response_timeout = Duration::from_secs(2);
    config
}

fn frame(packet_type: PacketType, request_id: i32, body: &str) -> Vec<u8> {
    Packet::new(packet_type, request_id, body)
        .to_bytes()
        .unwrap()
        .to_vec()
}

async fn read_packet(stream: &mut TcpStream) -> Packet {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).await.unwrap();
    let mut frame = vec![0u8; i32::from_le_bytes(prefix) as usize];
    stream.read_exact(&mut frame).await.unwrap();

    let mut bytes = prefix.to_vec();
    bytes.extend_from_slice(&frame);
    decode_as(&bytes, Role::Server).unwrap()
}

async fn accept_auth(stream: &mut TcpStream) {
    let auth = read_packet(stream).await;
    assert_eq!(auth.packet_type, PacketType::Auth);
    stream
        .write_all(&frame(PacketType::ResponseValue, AUTH_REQUEST_ID, ""))
        .await
        .unwrap();
    stream
        .write_all(&frame(PacketType::AuthResponse, AUTH_REQUEST_ID, ""))
        .await
        .unwrap();
}

/// Read one command and its terminator probe
async fn read_command(stream: &mut TcpStream) -> String {
    let command = read_packet(stream).await;
    let probe = read_packet(stream).await;
    assert_eq!(probe.request_id, TERMINATOR_REQUEST_ID);
    command.body
}

async fn next_named(events: &mut Subscription, name: &str) -> TypedEvent {
    timeout(Duration::from_secs(3), async {
        loop {
            let event = events.recv().await.expect("Subscription closed");
            if event.name() == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("No {name} event received"))
}

#[tokio::test]
async fn test_response_trickled_byte_by_byte() {
    let addr = scripted_server(|mut stream| async move {
        accept_auth(&mut stream).await;
        assert_eq!(read_command(&mut stream).await, "ListSquads");

        let mut bytes = frame(PacketType::ResponseValue, COMMAND_REQUEST_ID, "Team ID: 1 (USA)\n");
        bytes.extend(frame(PacketType::ResponseValue, COMMAND_REQUEST_ID, "no squads"));
        bytes.extend(frame(PacketType::ResponseValue, TERMINATOR_REQUEST_ID, ""));
        for byte in bytes {
            stream.write_all(&[byte]).await.unwrap();
            stream.flush().await.unwrap();
        }
        sleep(Duration::from_secs(1)).await;
    })
    .await;

    let session = Session::new(config(addr));
    session.open().await.unwrap();

    let response = session.execute("ListSquads").await.unwrap();
    assert_eq!(response, "Team ID: 1 (USA)\nno squads");
    session.close().await;
}

#[tokio::test]
async fn test_event_split_across_writes() {
    let line = format!("[ChatAdmin] [Online IDs:EOS: {EOS}] Alpha : heads up");
    let addr = scripted_server(move |mut stream| async move {
        accept_auth(&mut stream).await;
        let bytes = frame(PacketType::EventValue, 0, &line);
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        stream.write_all(head).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        stream.write_all(tail).await.unwrap();
        sleep(Duration::from_secs(1)).await;
    })
    .await;

    let session = Session::new(config(addr));
    let (_handle, mut events) = session.subscribe();
    session.open().await.unwrap();

    match next_named(&mut events, "CHAT_MESSAGE").await {
        TypedEvent::ChatMessage { message, .. } => assert_eq!(message, "heads up"),
        other => panic!("Expected ChatMessage, got {other:?}"),
    }
    session.close().await;
}

#[tokio::test]
async fn test_events_interleaved_with_response_stay_separate() {
    let kick = format!("Kicked player 4. [Online IDs= EOS: {EOS}] Delta");
    let addr = scripted_server(move |mut stream| async move {
        accept_auth(&mut stream).await;
        read_command(&mut stream).await;

        let mut bytes = frame(PacketType::ResponseValue, COMMAND_REQUEST_ID, "alpha ");
        bytes.extend(frame(PacketType::EventValue, 0, &kick));
        bytes.extend(frame(PacketType::AuthResponse, 99, "stray"));
        bytes.extend(frame(PacketType::ResponseValue, COMMAND_REQUEST_ID, "omega"));
        bytes.extend(frame(PacketType::ResponseValue, TERMINATOR_REQUEST_ID, ""));
        bytes.extend(frame(PacketType::ResponseValue, TERMINATOR_REQUEST_ID, "\u{0}\u{0}\u{0}\u{1}"));
        stream.write_all(&bytes).await.unwrap();
        sleep(Duration::from_secs(1)).await;
    })
    .await;

    let session = Session::new(config(addr));
    let (_handle, mut events) = session.subscribe();
    session.open().await.unwrap();

    let response = session.execute("ListPlayers").await.unwrap();

    assert_eq!(response, "alpha omega");
    match next_named(&mut events, "PLAYER_KICKED").await {
        TypedEvent::PlayerKicked { player_id, .. } => assert_eq!(player_id, "4"),
        other => panic!("Expected PlayerKicked, got {other:?}"),
    }
    session.close().await;
}

#[tokio::test]
async fn test_corrupt_length_prefix_drops_connection() {
    let addr = scripted_server(|mut stream| async move {
        accept_auth(&mut stream).await;
        stream.write_all(&i32::MAX.to_le_bytes()).await.unwrap();
        sleep(Duration::from_secs(1)).await;
    })
    .await;

    let session = Session::new(config(addr));
    let (_handle, mut events) = session.subscribe();
    session.open().await.unwrap();

    match next_named(&mut events, "ERROR").await {
        TypedEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::MalformedPacket),
        other => panic!("Expected Error, got {other:?}"),
    }
    next_named(&mut events, "DISCONNECTED").await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.metrics().snapshot().protocol_errors, 1);
}

#[tokio::test]
async fn test_corrupt_stream_is_not_reconnected() {
    let addr = scripted_server(|mut stream| async move {
        accept_auth(&mut stream).await;
        stream.write_all(&i32::MAX.to_le_bytes()).await.unwrap();
        sleep(Duration::from_secs(1)).await;
    })
    .await;

    let mut config = config(addr);
    config.auto_reconnect = true;
    config.reconnect_delay = Duration::from_millis(50);
    let session = Session::new(config);
    let (_handle, mut events) = session.subscribe();
    session.open().await.unwrap();

    next_named(&mut events, "DISCONNECTED").await;
    sleep(Duration::from_millis(300)).await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.metrics().snapshot().reconnect_attempts, 0);
    assert!(matches!(
        session.execute("ShowCurrentMap").await,
        Err(RconError::NotConnected)
    ));
}

#[tokio::test]
async fn test_connection_dropped_during_auth() {
    let addr = scripted_server(|mut stream| async move {
        let _ = read_packet(&mut stream).await;
        drop(stream);
    })
    .await;

    let session = Session::new(config(addr));

    assert!(matches!(
        session.open().await,
        Err(RconError::AuthenticationFailed)
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_unresponsive_auth_times_out() {
    let addr = scripted_server(|mut stream| async move {
        let _ = read_packet(&mut stream).await;
        sleep(Duration::from_secs(2)).await;
    })
    .await;

    let mut config = config(addr);
    config.connect_timeout = Duration::from_millis(200);
    let session = Session::new(config);

    assert!(matches!(session.open().await, Err(RconError::Timeout)));
    assert_eq!(session.metrics().snapshot().connection_errors, 1);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = Session::new(config(addr));
    let result = session.open().await;

    assert!(matches!(result, Err(RconError::Io(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
}
