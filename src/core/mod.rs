//! # Core Protocol Components
//!
//! Packet framing and the streaming codec.
//!
//! ## Components
//! - **Packet**: the RCON packet, its reserved request ids and pure encode/decode
//! - **Codec**: Tokio codec for framing packets over a TCP stream
//!
//! ## Wire Format
//! ```text
//! [Size(4)] [RequestId(4)] [Type(4)] [Body(N)] [0x00 0x00]
//! ```
//!
//! ## Limits
//! - Outbound packets are capped at 4096 bytes; longer commands are rejected before any write
//! - Inbound sizes outside 10..=64 KiB are treated as a desynchronised stream

pub mod codec;
pub mod packet;
