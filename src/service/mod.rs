//! # Session Service
//!
//! The connection session and its background supervision.
//!
//! ## Components
//! - **Session**: connect, authenticate, execute commands and publish pushed events
//! - **Supervisor**: keepalive probing and bounded reconnect after connection loss
//!
//! ## Lifecycle
//! ```text
//! Disconnected -> Connecting -> Authenticating -> Ready
//!       ^                                           |
//!       +------------- loss / close() --------------+
//! ```

pub mod session;
pub(crate) mod supervisor;

pub use session::{Session, SessionState};
