//! # Protocol Layer
//!
//! Everything between decoded packets and the consumers of the session.
//!
//! ## Components
//! - **Event**: the [`TypedEvent`](event::TypedEvent) enum and listing row types
//! - **Classifier**: ordered line rules turning event bodies into typed events
//! - **Listing**: parsers for `ListPlayers` / `ListSquads` responses
//! - **Bus**: bounded per-subscriber fan-out of typed events

pub mod bus;
pub mod classifier;
pub mod event;
pub mod listing;
