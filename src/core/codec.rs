//! # Packet Codec
//!
//! Tokio codec framing RCON packets over a byte stream.
//!
//! The decoder never interprets a packet before every byte its `size` field
//! announces is buffered, and treats out-of-range sizes as a desynchronised
//! stream rather than waiting forever for bytes that will not come.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::packet::{
    decode_frame, Packet, Role, MAX_INBOUND_SIZE, MIN_PACKET_SIZE,
};
use crate::error::{constants, RconError, Result};

/// Streaming codec for [`Packet`]s
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    role: Role,
}

impl PacketCodec {
    /// Codec for the client end: decodes what a server sends
    pub fn client() -> Self {
        Self { role: Role::Client }
    }

    /// Codec for the server end: decodes what a client sends
    pub fn server() -> Self {
        Self { role: Role::Server }
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::client()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = RconError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < 4 {
            return Ok(None);
        }

        let declared = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if declared < MIN_PACKET_SIZE as i32 || declared as usize > MAX_INBOUND_SIZE {
            return Err(RconError::MalformedPacket(format!(
                "{}: {declared}",
                constants::ERR_SIZE_OUT_OF_RANGE
            )));
        }

        let total = 4 + declared as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(4);
        let frame = src.split_to(declared as usize);
        let packet = decode_frame(&frame, self.role)?;
        trace!(
            request_id = packet.request_id,
            packet_type = ?packet.packet_type,
            body_len = packet.body.len(),
            "Decoded packet"
        );
        Ok(Some(packet))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = RconError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        item.write_to(dst)
    }
}
