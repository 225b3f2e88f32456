//! # Utility Modules
//!
//! Supporting utilities for logging, timing and observability.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Timeout**: default durations and async timeout wrappers
//! - **Metrics**: per-session atomic counters and an operation timer

pub mod logging;
pub mod metrics;
pub mod timeout;
