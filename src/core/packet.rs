//! # RCON Packet
//!
//! One length-prefixed unit of the wire protocol and the pure functions that
//! encode and decode it.
//!
//! ## Wire Format
//! ```text
//! [Size(4, LE)] [RequestId(4, LE)] [Type(4, LE)] [Body(N, UTF-8)] [0x00 0x00]
//! ```
//! `Size` counts every byte after itself, so the smallest legal packet
//! (empty body) declares a size of 10.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{constants, RconError, Result};

/// Largest packet, length prefix included, that the client will send
pub const MAX_FRAME_SIZE: usize = 4096;

/// Largest size a remote may declare before the stream is considered desynchronised
pub const MAX_INBOUND_SIZE: usize = 64 * 1024;

/// Bytes covered by `size` besides the body: request id, type tag, terminator
pub const HEADER_OVERHEAD: usize = 4 + 4 + 2;

/// Smallest legal declared size
pub const MIN_PACKET_SIZE: usize = HEADER_OVERHEAD;

/// Request id reserved for the authentication packet
pub const AUTH_REQUEST_ID: i32 = 10;

/// Request id used by every ordinary command
pub const COMMAND_REQUEST_ID: i32 = 20;

/// Request id reserved for the terminator probe that follows each command
pub const TERMINATOR_REQUEST_ID: i32 = 30;

/// Request id the remote answers an auth attempt with when the password is wrong
pub const AUTH_FAILED_REQUEST_ID: i32 = -1;

const TERMINATOR: [u8; 2] = [0x00, 0x00];

/// Which end of the connection is decoding
///
/// `AuthResponse` and `ExecCommand` share tag 2 on the wire, so the meaning of
/// that tag depends on who sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Decodes what a server sends
    Client,
    /// Decodes what a client sends
    Server,
}

/// Packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Auth,
    AuthResponse,
    ExecCommand,
    ResponseValue,
    EventValue,
}

impl PacketType {
    /// Tag written on the wire
    pub fn tag(self) -> i32 {
        match self {
            PacketType::ResponseValue => 0,
            PacketType::EventValue => 1,
            PacketType::AuthResponse | PacketType::ExecCommand => 2,
            PacketType::Auth => 3,
        }
    }

    /// Resolve a wire tag as seen by `role`
    pub fn from_tag(tag: i32, role: Role) -> Result<Self> {
        match (tag, role) {
            (0, _) => Ok(PacketType::ResponseValue),
            (1, _) => Ok(PacketType::EventValue),
            (2, Role::Client) => Ok(PacketType::AuthResponse),
            (2, Role::Server) => Ok(PacketType::ExecCommand),
            (3, _) => Ok(PacketType::Auth),
            _ => Err(RconError::MalformedPacket(format!(
                "{}: {tag}",
                constants::ERR_UNKNOWN_TYPE
            ))),
        }
    }

    /// Role that decodes packets of this type, i.e. the receiving end
    pub fn receiver(self) -> Role {
        match self {
            PacketType::Auth | PacketType::ExecCommand => Role::Server,
            PacketType::AuthResponse | PacketType::ResponseValue | PacketType::EventValue => {
                Role::Client
            }
        }
    }
}

/// A decoded RCON packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub request_id: i32,
    pub packet_type: PacketType,
    pub body: String,
}

impl Packet {
    pub fn new(packet_type: PacketType, request_id: i32, body: impl Into<String>) -> Self {
        Self {
            request_id,
            packet_type,
            body: body.into(),
        }
    }

    /// Authentication packet carrying the password
    pub fn auth(password: &str) -> Self {
        Self::new(PacketType::Auth, AUTH_REQUEST_ID, password)
    }

    /// Ordinary command packet
    pub fn command(command: &str) -> Self {
        Self::new(PacketType::ExecCommand, COMMAND_REQUEST_ID, command)
    }

    /// Empty command sent after each real command to mark the end of its response
    pub fn terminator_probe() -> Self {
        Self::new(PacketType::ExecCommand, TERMINATOR_REQUEST_ID, "")
    }

    /// Value of the `size` field for this packet
    pub fn declared_size(&self) -> usize {
        HEADER_OVERHEAD + self.body.len()
    }

    /// Total bytes on the wire, length prefix included
    pub fn encoded_len(&self) -> usize {
        4 + self.declared_size()
    }

    /// Whether this is the remote's answer to the terminator probe
    pub fn is_terminator_signature(&self) -> bool {
        self.packet_type == PacketType::ResponseValue
            && self.request_id == TERMINATOR_REQUEST_ID
            && self.body.is_empty()
    }

    /// Write this packet into `dst`, rejecting frames above [`MAX_FRAME_SIZE`]
    pub fn write_to(&self, dst: &mut BytesMut) -> Result<()> {
        let total = self.encoded_len();
        if total > MAX_FRAME_SIZE {
            return Err(RconError::FrameTooLarge(total));
        }

        dst.reserve(total);
        dst.put_i32_le(self.declared_size() as i32);
        dst.put_i32_le(self.request_id);
        dst.put_i32_le(self.packet_type.tag());
        dst.put_slice(self.body.as_bytes());
        dst.put_slice(&TERMINATOR);
        Ok(())
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a packet sent by a server
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        decode_as(data, Role::Client)
    }
}

/// Encode a packet; fails with `FrameTooLarge` before producing any bytes
pub fn encode(packet_type: PacketType, request_id: i32, body: &str) -> Result<Bytes> {
    Packet::new(packet_type, request_id, body).to_bytes()
}

/// Decode exactly one server-sent packet
pub fn decode(data: &[u8]) -> Result<Packet> {
    decode_as(data, Role::Client)
}

/// Decode exactly one packet as seen by `role`
///
/// `data` must hold the whole packet and nothing more.
pub fn decode_as(data: &[u8], role: Role) -> Result<Packet> {
    if data.len() < 4 {
        return Err(RconError::MalformedPacket(
            constants::ERR_TRUNCATED_HEADER.into(),
        ));
    }

    let declared = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let buffered = data.len() - 4;
    if declared < 0 || declared as usize != buffered {
        return Err(RconError::MalformedPacket(format!(
            "{} (declared {declared}, buffered {buffered})",
            constants::ERR_LENGTH_MISMATCH
        )));
    }

    decode_frame(&data[4..], role)
}

/// Decode the bytes covered by `size` (everything after the length prefix)
pub(crate) fn decode_frame(frame: &[u8], role: Role) -> Result<Packet> {
    if frame.len() < MIN_PACKET_SIZE {
        return Err(RconError::MalformedPacket(format!(
            "{} ({} < {MIN_PACKET_SIZE})",
            constants::ERR_SIZE_OUT_OF_RANGE,
            frame.len()
        )));
    }

    let body_end = frame.len() - TERMINATOR.len();
    if frame[body_end..] != TERMINATOR {
        return Err(RconError::MalformedPacket(
            constants::ERR_MISSING_TERMINATOR.into(),
        ));
    }

    let request_id = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let tag = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
    let packet_type = PacketType::from_tag(tag, role)?;
    let body = String::from_utf8_lossy(&frame[8..body_end]).into_owned();

    Ok(Packet {
        request_id,
        packet_type,
        body,
    })
}
