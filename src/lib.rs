//! # squad-rcon
//!
//! Async RCON client for Squad game servers.
//!
//! Speaks the Source-style RCON framing used by Squad, reassembles multi-packet
//! command responses, and turns the server's unsolicited log lines (chat, kicks,
//! bans, admin camera use, squad creation) into typed events delivered to any
//! number of subscribers.
//!
//! ## Modules
//! - [`core`]: packet format and streaming codec
//! - [`protocol`]: event types, line classifier, listing parsers and event bus
//! - [`service`]: the connection session and its keepalive/reconnect supervisor
//! - [`config`]: TOML/env configuration
//! - [`utils`]: logging, timeouts and metrics
//!
//! ## Quick Start
//! ```rust,no_run
//! use squad_rcon::{RconSettings, Session, TypedEvent};
//!
//! #[tokio::main]
//! async fn main() -> squad_rcon::Result<()> {
//!     let settings = RconSettings::from_env()?;
//!     squad_rcon::utils::logging::init_logging(&settings.logging)?;
//!
//!     let session = Session::new(settings.rcon);
//!     let (_handle, mut events) = session.subscribe();
//!     session.open().await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let TypedEvent::ChatMessage { player_name, message, .. } = &event {
//!             println!("{player_name}: {message}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use crate::config::{LoggingConfig, RconConfig, RconSettings};
pub use crate::core::codec::PacketCodec;
pub use crate::core::packet::{Packet, PacketType, Role};
pub use crate::error::{ErrorKind, RconError, Result};
pub use crate::protocol::bus::{EventBus, Subscription, SubscriptionHandle};
pub use crate::protocol::classifier::{classify, Classifier, RegexRule, Rule};
pub use crate::protocol::event::{ChatChannel, Player, PlayerList, Squad, TypedEvent};
pub use crate::service::{Session, SessionState};
