//! Integration tests for the streaming packet codec
//!
//! These tests feed the decoder the way a TCP socket would: split at arbitrary
//! points, several packets per read, and garbage length prefixes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use squad_rcon::core::codec::PacketCodec;
use squad_rcon::core::packet::{
    Packet, PacketType, Role, COMMAND_REQUEST_ID, MAX_INBOUND_SIZE, TERMINATOR_REQUEST_ID,
};
use squad_rcon::RconError;
use tokio_util::codec::{Decoder, Encoder};

fn server_packet(packet_type: PacketType, request_id: i32, body: &str) -> BytesMut {
    let mut buf = BytesMut::new();
    PacketCodec::server()
        .encode(Packet::new(packet_type, request_id, body), &mut buf)
        .expect("Failed to encode");
    buf
}

#[test]
fn test_codec_decodes_complete_packet() {
    let mut codec = PacketCodec::client();
    let mut buffer = server_packet(PacketType::ResponseValue, COMMAND_REQUEST_ID, "Map: Narva");

    let decoded = codec.decode(&mut buffer).expect("Failed to decode").unwrap();

    assert_eq!(decoded.packet_type, PacketType::ResponseValue);
    assert_eq!(decoded.request_id, COMMAND_REQUEST_ID);
    assert_eq!(decoded.body, "Map: Narva");
    assert_eq!(buffer.len(), 0);
}

#[test]
fn test_codec_partial_header_waits() {
    let mut codec = PacketCodec::client();
    let mut buffer = BytesMut::from(&[0x0E, 0x00, 0x00][..]);

    let result = codec.decode(&mut buffer).expect("Decode should not error");

    assert!(result.is_none());
    assert_eq!(buffer.len(), 3);
}

#[test]
fn test_codec_partial_body_preserves_buffer() {
    let mut codec = PacketCodec::client();
    let full = server_packet(PacketType::EventValue, 0, "[ChatAll] hello");
    let mut buffer = BytesMut::from(&full[..full.len() - 5]);

    assert!(codec.decode(&mut buffer).unwrap().is_none());
    assert_eq!(buffer.len(), full.len() - 5);

    buffer.extend_from_slice(&full[full.len() - 5..]);
    let decoded = codec.decode(&mut buffer).unwrap().unwrap();
    assert_eq!(decoded.packet_type, PacketType::EventValue);
    assert_eq!(decoded.body, "[ChatAll] hello");
}

#[test]
fn test_codec_byte_at_a_time() {
    let mut codec = PacketCodec::client();
    let full = server_packet(PacketType::ResponseValue, COMMAND_REQUEST_ID, "ID: 0 | Name: a");
    let mut buffer = BytesMut::new();
    let mut decoded = Vec::new();

    for byte in full.iter() {
        buffer.extend_from_slice(&[*byte]);
        if let Some(packet) = codec.decode(&mut buffer).unwrap() {
            decoded.push(packet);
        }
    }

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].body, "ID: 0 | Name: a");
}

#[test]
fn test_codec_multiple_packets_in_one_read() {
    let mut codec = PacketCodec::client();
    let mut buffer = BytesMut::new();
    buffer.extend_from_slice(&server_packet(PacketType::ResponseValue, COMMAND_REQUEST_ID, "part one "));
    buffer.extend_from_slice(&server_packet(PacketType::ResponseValue, COMMAND_REQUEST_ID, "part two"));
    buffer.extend_from_slice(&server_packet(PacketType::ResponseValue, TERMINATOR_REQUEST_ID, ""));

    let mut bodies = Vec::new();
    while let Some(packet) = codec.decode(&mut buffer).unwrap() {
        bodies.push((packet.request_id, packet.body));
    }

    assert_eq!(
        bodies,
        vec![
            (COMMAND_REQUEST_ID, "part one ".to_string()),
            (COMMAND_REQUEST_ID, "part two".to_string()),
            (TERMINATOR_REQUEST_ID, String::new()),
        ]
    );
    assert!(buffer.is_empty());
}

#[test]
fn test_codec_rejects_undersized_declaration() {
    let mut codec = PacketCodec::client();
    let mut buffer = BytesMut::from(&[9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0][..]);

    assert!(matches!(
        codec.decode(&mut buffer),
        Err(RconError::MalformedPacket(_))
    ));
}

#[test]
fn test_codec_rejects_negative_declaration() {
    let mut codec = PacketCodec::client();
    let mut buffer = BytesMut::from(&(-5i32).to_le_bytes()[..]);

    assert!(matches!(
        codec.decode(&mut buffer),
        Err(RconError::MalformedPacket(_))
    ));
}

#[test]
fn test_codec_rejects_oversized_declaration_without_waiting() {
    let mut codec = PacketCodec::client();
    let declared = (MAX_INBOUND_SIZE + 1) as i32;
    let mut buffer = BytesMut::from(&declared.to_le_bytes()[..]);

    assert!(matches!(
        codec.decode(&mut buffer),
        Err(RconError::MalformedPacket(_))
    ));
}

#[test]
fn test_codec_rejects_unknown_type_tag() {
    let mut codec = PacketCodec::client();
    let mut buffer = BytesMut::new();
    buffer.extend_from_slice(&10i32.to_le_bytes());
    buffer.extend_from_slice(&COMMAND_REQUEST_ID.to_le_bytes());
    buffer.extend_from_slice(&7i32.to_le_bytes());
    buffer.extend_from_slice(&[0, 0]);

    assert!(matches!(
        codec.decode(&mut buffer),
        Err(RconError::MalformedPacket(_))
    ));
}

#[test]
fn test_codec_invalid_utf8_is_lossy() {
    let mut codec = PacketCodec::client();
    let mut buffer = BytesMut::new();
    buffer.extend_from_slice(&12i32.to_le_bytes());
    buffer.extend_from_slice(&COMMAND_REQUEST_ID.to_le_bytes());
    buffer.extend_from_slice(&0i32.to_le_bytes());
    buffer.extend_from_slice(&[0xFF, b'a', 0, 0]);

    let decoded = codec.decode(&mut buffer).unwrap().unwrap();
    assert_eq!(decoded.body, "\u{FFFD}a");
}

#[test]
fn test_codec_encode_rejects_oversized_without_writing() {
    let mut codec = PacketCodec::client();
    let mut buffer = BytesMut::new();
    let command = "x".repeat(5000);

    let result = codec.encode(Packet::command(&command), &mut buffer);

    assert!(matches!(result, Err(RconError::FrameTooLarge(_))));
    assert!(buffer.is_empty());
}

#[test]
fn test_codec_roles_disagree_on_tag_two() {
    let mut buffer = BytesMut::new();
    PacketCodec::client()
        .encode(Packet::command("ShowCurrentMap"), &mut buffer)
        .unwrap();

    let mut as_server = buffer.clone();
    let seen_by_server = PacketCodec::server().decode(&mut as_server).unwrap().unwrap();
    let seen_by_client = PacketCodec::client().decode(&mut buffer).unwrap().unwrap();

    assert_eq!(PacketCodec::server().role(), Role::Server);
    assert_eq!(seen_by_server.packet_type, PacketType::ExecCommand);
    assert_eq!(seen_by_client.packet_type, PacketType::AuthResponse);
}
