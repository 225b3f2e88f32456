//! Observability and Metrics
//!
//! Per-session counters for monitoring connection health, command traffic and
//! event fan-out.
//!
//! Uses atomic counters for thread-safe metrics collection. Each
//! [`Session`](crate::Session) owns its own [`Metrics`] instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for one session
#[derive(Debug)]
pub struct Metrics {
    /// Successful connections (authenticated)
    pub connections_total: AtomicU64,
    /// Connection attempts that failed before `Ready`
    pub connection_errors: AtomicU64,
    /// Authentication attempts rejected by the remote
    pub auth_failures: AtomicU64,
    /// Commands written to the socket
    pub commands_sent: AtomicU64,
    /// Commands that received their full response
    pub commands_completed: AtomicU64,
    /// Commands that gave up waiting for a response
    pub commands_timed_out: AtomicU64,
    /// Packets decoded off the wire
    pub packets_received: AtomicU64,
    /// Body bytes decoded off the wire
    pub bytes_received: AtomicU64,
    /// Events handed to at least one subscriber queue
    pub events_published: AtomicU64,
    /// Event deliveries dropped because a subscriber queue was full
    pub events_dropped: AtomicU64,
    /// Reconnect attempts made by the supervisor
    pub reconnect_attempts: AtomicU64,
    /// Protocol errors (malformed packets)
    pub protocol_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            commands_completed: AtomicU64::new(0),
            commands_timed_out: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failed(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_completed(&self) {
        self.commands_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_timed_out(&self) {
        self.commands_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded packet
    pub fn packet_received(&self, body_len: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(body_len, Ordering::Relaxed);
    }

    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_completed: self.commands_completed.load(Ordering::Relaxed),
            commands_timed_out: self.commands_timed_out.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connection_errors = snapshot.connection_errors,
            auth_failures = snapshot.auth_failures,
            commands_sent = snapshot.commands_sent,
            commands_completed = snapshot.commands_completed,
            commands_timed_out = snapshot.commands_timed_out,
            packets_received = snapshot.packets_received,
            bytes_received = snapshot.bytes_received,
            events_published = snapshot.events_published,
            events_dropped = snapshot.events_dropped,
            reconnect_attempts = snapshot.reconnect_attempts,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "RCON metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connection_errors: u64,
    pub auth_failures: u64,
    pub commands_sent: u64,
    pub commands_completed: u64,
    pub commands_timed_out: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub events_published: u64,
    pub events_dropped: u64,
    pub reconnect_attempts: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
