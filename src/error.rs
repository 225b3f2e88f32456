//! # Error Types
//!
//! Error handling for the RCON client.
//!
//! This module defines every error variant the client can surface, from low-level
//! socket failures to protocol desynchronisation and rejected credentials.
//!
//! ## Error Categories
//! - **Framing Errors**: oversized commands, malformed inbound packets
//! - **Session Errors**: authentication failures, lost or closed connections
//! - **Command Errors**: timeouts and undelivered responses
//! - **Configuration Errors**: invalid or unreadable settings
//!
//! Every error maps onto a cloneable [`ErrorKind`] so it can travel on the event bus.
//!
//! ## Example Usage
//! ```rust,no_run
//! use squad_rcon::error::{RconError, Result};
//! use tracing::{error, info};
//!
//! async fn current_map(session: &squad_rcon::Session) -> Result<String> {
//!     session.execute("ShowCurrentMap").await
//! }
//!
//! async fn report(session: &squad_rcon::Session) {
//!     match current_map(session).await {
//!         Ok(map) => info!(map, "Current map"),
//!         Err(RconError::FrameTooLarge(size)) => error!(size, "Command too long"),
//!         Err(e) => error!(error = %e, "Command failed"),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants shared across modules.
pub mod constants {
    /// Connection errors
    pub const ERR_REMOTE_CLOSED: &str = "Remote closed the connection";
    pub const ERR_KEEPALIVE_FAILED: &str = "Keepalive command got no response";
    pub const ERR_WRITE_FAILED: &str = "Failed to write to the socket";

    /// Protocol validation errors
    pub const ERR_LENGTH_MISMATCH: &str = "Declared size does not match buffered length";
    pub const ERR_SIZE_OUT_OF_RANGE: &str = "Declared size outside the accepted range";
    pub const ERR_MISSING_TERMINATOR: &str = "Packet is missing its null terminator";
    pub const ERR_UNKNOWN_TYPE: &str = "Unknown packet type tag";
    pub const ERR_TRUNCATED_HEADER: &str = "Buffer shorter than the packet header";

    /// Reconnect errors
    pub const ERR_RECONNECT_EXHAUSTED: &str = "Reconnect attempts exhausted";
}

/// RconError is the error type for every client operation
#[derive(Error, Debug)]
pub enum RconError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame too large: {0} bytes (max 4096)")]
    FrameTooLarge(usize),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Connection reset by remote")]
    ConnectionReset,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Not connected")]
    NotConnected,

    #[error("No response: command channel closed before delivery")]
    NoResponse,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RconError {
    /// Coarse classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RconError::Io(e) => match e.kind() {
                io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => {
                    ErrorKind::ConnectionReset
                }
                _ => ErrorKind::Io,
            },
            RconError::FrameTooLarge(_) => ErrorKind::FrameTooLarge,
            RconError::MalformedPacket(_) => ErrorKind::MalformedPacket,
            RconError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            RconError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            RconError::ConnectionReset => ErrorKind::ConnectionReset,
            RconError::ConnectionClosed => ErrorKind::ConnectionClosed,
            RconError::NotConnected => ErrorKind::NotConnected,
            RconError::NoResponse => ErrorKind::NoResponse,
            RconError::Timeout => ErrorKind::Timeout,
            RconError::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Whether the supervisor may recover from this error by reconnecting
    ///
    /// A desynchronised stream closes the session for good, like bad credentials.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::AuthenticationFailed | ErrorKind::MalformedPacket | ErrorKind::Config
        )
    }

    /// Rebuild an equivalent error for delivery to another waiter
    pub(crate) fn duplicate(&self) -> RconError {
        match self {
            RconError::Io(e) => RconError::Io(io::Error::new(e.kind(), e.to_string())),
            RconError::FrameTooLarge(n) => RconError::FrameTooLarge(*n),
            RconError::MalformedPacket(m) => RconError::MalformedPacket(m.clone()),
            RconError::AuthenticationFailed => RconError::AuthenticationFailed,
            RconError::ConnectionLost(m) => RconError::ConnectionLost(m.clone()),
            RconError::ConnectionReset => RconError::ConnectionReset,
            RconError::ConnectionClosed => RconError::ConnectionClosed,
            RconError::NotConnected => RconError::NotConnected,
            RconError::NoResponse => RconError::NoResponse,
            RconError::Timeout => RconError::Timeout,
            RconError::ConfigError(m) => RconError::ConfigError(m.clone()),
        }
    }
}

/// Cloneable error classification carried by error events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    FrameTooLarge,
    MalformedPacket,
    AuthenticationFailed,
    ConnectionLost,
    ConnectionReset,
    ConnectionClosed,
    NotConnected,
    NoResponse,
    Timeout,
    Config,
}

/// Type alias for Results using RconError
pub type Result<T> = std::result::Result<T, RconError>;
