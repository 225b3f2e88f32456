//! # Connection Session
//!
//! Owns one RCON connection: the TCP socket, the authentication handshake,
//! the read loop that demultiplexes responses from pushed events, and the
//! single in-flight command slot.
//!
//! ## Command execution
//! The protocol has no end-of-response marker, so every command is followed by
//! an empty "terminator probe" command. The server answers packets strictly in
//! order, so the probe's empty reply arrives only after every fragment of the
//! real response. The read loop accumulates response bodies until it sees that
//! reply and then hands the buffer to the waiting caller.
//!
//! Only one command may be in flight at a time; callers queue on a fair mutex
//! and are served in submission order.
//!
//! ## Usage
//! ```rust,no_run
//! use squad_rcon::{RconConfig, Session};
//!
//! # async fn run() -> squad_rcon::Result<()> {
//! let session = Session::new(RconConfig::new("127.0.0.1", 21114, "secret"));
//! session.open().await?;
//!
//! let (_handle, mut events) = session.subscribe();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.name());
//!     }
//! });
//!
//! let map = session.execute("ShowCurrentMap").await?;
//! println!("{map}");
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::RconConfig;
use crate::core::codec::PacketCodec;
use crate::core::packet::{
    Packet, PacketType, AUTH_REQUEST_ID, MAX_FRAME_SIZE, TERMINATOR_REQUEST_ID,
};
use crate::error::{constants, RconError, Result};
use crate::protocol::bus::{EventBus, Subscription, SubscriptionHandle};
use crate::protocol::classifier::Classifier;
use crate::protocol::event::{PlayerList, Squad, TypedEvent};
use crate::protocol::listing::{parse_players, parse_squads};
use crate::service::supervisor;
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::timeout::with_timeout_error;

type Reader = FramedRead<OwnedReadHalf, PacketCodec>;
type Writer = FramedWrite<OwnedWriteHalf, PacketCodec>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Response accumulation for the command in flight
#[derive(Default)]
struct Pending {
    buffer: String,
    waiter: Option<oneshot::Sender<Result<String>>>,
    /// Abandoned commands whose terminator has not come back yet
    stale: usize,
    /// A dropped caller left a command in the writer without its terminator
    unterminated: bool,
    last_command: Option<String>,
}

struct Lifecycle {
    /// Cancels the read loop and keepalive of the current connection
    connection: Option<CancellationToken>,
    /// Cancelled by `close()`, replaced by the next `open()`
    shutdown: CancellationToken,
    /// Bumped on every new connection and on close; stale loops compare against it
    generation: u64,
}

pub(crate) struct Inner {
    config: RconConfig,
    classifier: Classifier,
    bus: EventBus,
    metrics: Arc<Metrics>,
    state: watch::Sender<SessionState>,
    writer: Mutex<Option<Writer>>,
    command_slot: Mutex<()>,
    connect_lock: Mutex<()>,
    pending: StdMutex<Pending>,
    lifecycle: StdMutex<Lifecycle>,
    pub(crate) reconnecting: AtomicBool,
    pub(crate) reconnect_refused: AtomicBool,
}

/// Handle to one RCON session; clones share the same connection
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.inner.config.address())
            .field("state", &self.state())
            .finish()
    }
}

/// How much of a command reached the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteStage {
    Registered,
    CommandBuffered,
    Buffered,
}

/// Removes an abandoned waiter and accounts for what it left in the writer
struct InFlightGuard<'a> {
    pending: &'a StdMutex<Pending>,
    stage: WriteStage,
}

impl<'a> InFlightGuard<'a> {
    fn new(pending: &'a StdMutex<Pending>) -> Self {
        Self {
            pending,
            stage: WriteStage::Registered,
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut pending = lock(self.pending);
        if pending.waiter.take().is_none() {
            return;
        }
        match self.stage {
            WriteStage::Registered => {}
            WriteStage::CommandBuffered => pending.unterminated = true,
            WriteStage::Buffered => pending.stale += 1,
        }
    }
}

/// Queue `packet` and its terminator, then flush
///
/// `stage` advances as each packet lands in the writer's buffer. A command
/// orphaned without its terminator by an earlier dropped caller is terminated
/// first and its reply marked stale.
async fn write_command<W>(
    sink: &mut FramedWrite<W, PacketCodec>,
    packet: Packet,
    pending: &StdMutex<Pending>,
    stage: &mut WriteStage,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let orphaned = lock(pending).unterminated;
    if orphaned {
        sink.feed(Packet::terminator_probe()).await?;
        let mut pending = lock(pending);
        pending.unterminated = false;
        pending.stale += 1;
    }

    sink.feed(packet).await?;
    *stage = WriteStage::CommandBuffered;
    sink.feed(Packet::terminator_probe()).await?;
    *stage = WriteStage::Buffered;
    sink.flush().await
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn classify_read_error(error: RconError) -> RconError {
    match error {
        RconError::Io(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ) =>
        {
            RconError::ConnectionReset
        }
        RconError::Io(e) => RconError::ConnectionLost(e.to_string()),
        other => other,
    }
}

impl Session {
    /// Session using the built-in line classifier
    pub fn new(config: RconConfig) -> Self {
        Self::with_classifier(config, Classifier::new())
    }

    /// Session using a custom classifier for event packets
    pub fn with_classifier(config: RconConfig, classifier: Classifier) -> Self {
        let metrics = Arc::new(Metrics::new());
        let bus = EventBus::with_capacity(config.event_buffer).with_metrics(metrics.clone());
        let (state, _) = watch::channel(SessionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                config,
                classifier,
                bus,
                metrics,
                state,
                writer: Mutex::new(None),
                command_slot: Mutex::new(()),
                connect_lock: Mutex::new(()),
                pending: StdMutex::new(Pending::default()),
                lifecycle: StdMutex::new(Lifecycle {
                    connection: None,
                    shutdown: CancellationToken::new(),
                    generation: 0,
                }),
                reconnecting: AtomicBool::new(false),
                reconnect_refused: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &RconConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Last command passed to [`Session::execute`]
    pub fn last_command(&self) -> Option<String> {
        lock(&self.inner.pending).last_command.clone()
    }

    pub fn subscribe(&self) -> (SubscriptionHandle, Subscription) {
        self.inner.bus.subscribe()
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.bus.unsubscribe(handle)
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        lock(&self.inner.lifecycle).shutdown.clone()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    fn publish_error(&self, error: &RconError) {
        self.inner.bus.publish(TypedEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Connect and authenticate
    ///
    /// A no-op when already `Ready`. Re-arms a session previously closed with
    /// [`Session::close`].
    #[instrument(skip(self), fields(address = %self.inner.config.address()))]
    pub async fn open(&self) -> Result<()> {
        {
            let mut lifecycle = lock(&self.inner.lifecycle);
            if lifecycle.shutdown.is_cancelled() {
                lifecycle.shutdown = CancellationToken::new();
            }
        }
        self.connect().await
    }

    /// One connection attempt; used by `open()` and the reconnect supervisor
    pub(crate) async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        let shutdown = self.shutdown_token();
        if shutdown.is_cancelled() {
            return Err(RconError::ConnectionClosed);
        }

        self.set_state(SessionState::Connecting);
        let attempt = with_timeout_error(self.establish(), self.inner.config.connect_timeout).await;

        match attempt {
            Ok(_) if shutdown.is_cancelled() => {
                self.set_state(SessionState::Disconnected);
                Err(RconError::ConnectionClosed)
            }
            Ok((reader, writer)) => {
                self.install(reader, writer).await;
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                match e {
                    RconError::AuthenticationFailed => self.inner.metrics.auth_failed(),
                    _ => self.inner.metrics.connection_error(),
                }
                warn!(error = %e, "Failed to open RCON session");
                self.publish_error(&e);
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<(Reader, Writer)> {
        let stream = TcpStream::connect(self.inner.config.address()).await?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        let mut reader = FramedRead::new(read, PacketCodec::client());
        let mut writer = FramedWrite::new(write, PacketCodec::client());

        self.set_state(SessionState::Authenticating);
        writer.send(Packet::auth(&self.inner.config.password)).await?;

        loop {
            match reader.next().await {
                Some(Ok(packet)) if packet.packet_type == PacketType::AuthResponse => {
                    if packet.request_id == AUTH_REQUEST_ID {
                        return Ok((reader, writer));
                    }
                    warn!(request_id = packet.request_id, "Authentication rejected");
                    return Err(RconError::AuthenticationFailed);
                }
                Some(Ok(packet)) => {
                    trace!(packet_type = ?packet.packet_type, "Skipping packet during authentication");
                }
                Some(Err(RconError::Io(e))) => {
                    debug!(error = %e, "Connection failed during authentication");
                    return Err(RconError::AuthenticationFailed);
                }
                Some(Err(e)) => return Err(e),
                None => return Err(RconError::AuthenticationFailed),
            }
        }
    }

    async fn install(&self, reader: Reader, writer: Writer) {
        let token = CancellationToken::new();
        let generation = {
            let mut lifecycle = lock(&self.inner.lifecycle);
            if let Some(previous) = lifecycle.connection.replace(token.clone()) {
                previous.cancel();
            }
            lifecycle.generation += 1;
            lifecycle.generation
        };

        *self.inner.writer.lock().await = Some(writer);
        {
            let mut pending = lock(&self.inner.pending);
            pending.buffer.clear();
            pending.stale = 0;
            pending.unterminated = false;
        }

        self.set_state(SessionState::Ready);
        self.inner.metrics.connection_established();
        info!(address = %self.inner.config.address(), generation, "RCON session ready");

        tokio::spawn(self.clone().read_loop(reader, token.clone(), generation));
        supervisor::spawn_keepalive(self.clone(), token, generation);
        self.inner.bus.publish(TypedEvent::Connected);
    }

    async fn read_loop(self, mut reader: Reader, token: CancellationToken, generation: u64) {
        let error = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(generation, "Read loop stopped");
                    return;
                }
                frame = reader.next() => match frame {
                    Some(Ok(packet)) => self.handle_packet(packet),
                    Some(Err(e)) => break classify_read_error(e),
                    None => break RconError::ConnectionLost(constants::ERR_REMOTE_CLOSED.into()),
                },
            }
        };

        if matches!(error, RconError::MalformedPacket(_)) {
            self.inner.metrics.protocol_error();
        }
        self.connection_lost(generation, error).await;
    }

    fn handle_packet(&self, packet: Packet) {
        self.inner.metrics.packet_received(packet.body.len() as u64);

        match packet.packet_type {
            PacketType::EventValue => {
                for event in self.inner.classifier.classify_body(&packet.body) {
                    trace!(event = event.name(), "Publishing event");
                    self.inner.bus.publish(event);
                }
            }
            PacketType::ResponseValue if packet.request_id == TERMINATOR_REQUEST_ID => {
                if packet.is_terminator_signature() {
                    self.complete_pending();
                } else {
                    trace!(len = packet.body.len(), "Discarding terminator trailer");
                }
            }
            PacketType::ResponseValue => {
                lock(&self.inner.pending).buffer.push_str(&packet.body);
            }
            other => {
                debug!(packet_type = ?other, request_id = packet.request_id, "Ignoring unexpected packet");
            }
        }
    }

    fn complete_pending(&self) {
        let mut pending = lock(&self.inner.pending);
        let response = std::mem::take(&mut pending.buffer);

        if pending.stale > 0 {
            pending.stale -= 1;
            debug!(len = response.len(), "Discarded response of abandoned command");
            return;
        }

        match pending.waiter.take() {
            Some(waiter) => {
                let _ = waiter.send(Ok(response));
            }
            None => debug!("Terminator reply with no command in flight"),
        }
    }

    fn fail_pending(&self, error: RconError) {
        let mut pending = lock(&self.inner.pending);
        pending.buffer.clear();
        pending.stale = 0;
        pending.unterminated = false;
        if let Some(waiter) = pending.waiter.take() {
            let _ = waiter.send(Err(error));
        }
    }

    fn not_ready_error(&self) -> RconError {
        if self.shutdown_token().is_cancelled() {
            RconError::ConnectionClosed
        } else {
            RconError::NotConnected
        }
    }

    /// Execute a command and return its full response text
    ///
    /// Fails with `FrameTooLarge` before touching the socket if the command
    /// does not fit in one packet.
    #[instrument(skip(self), level = "debug")]
    pub async fn execute(&self, command: &str) -> Result<String> {
        self.execute_within(command, self.inner.config.response_timeout)
            .await
    }

    /// Execute with `wait` bounding only the time after the command is written
    ///
    /// Time spent queued behind other commands does not count.
    pub(crate) async fn execute_within(&self, command: &str, wait: Duration) -> Result<String> {
        let packet = Packet::command(command);
        if packet.encoded_len() > MAX_FRAME_SIZE {
            return Err(RconError::FrameTooLarge(packet.encoded_len()));
        }

        let _slot = self.inner.command_slot.lock().await;
        let _timer = Timer::start("execute");
        let (tx, rx) = oneshot::channel();
        let mut in_flight = InFlightGuard::new(&self.inner.pending);

        let generation = lock(&self.inner.lifecycle).generation;
        {
            let mut writer = self.inner.writer.lock().await;
            let Some(sink) = writer.as_mut() else {
                return Err(self.not_ready_error());
            };

            {
                let mut pending = lock(&self.inner.pending);
                pending.waiter = Some(tx);
                pending.last_command = Some(command.to_string());
            }

            let sent =
                write_command(sink, packet, &self.inner.pending, &mut in_flight.stage).await;

            if let Err(e) = sent {
                lock(&self.inner.pending).waiter = None;
                drop(writer);
                warn!(error = %e, "{}", constants::ERR_WRITE_FAILED);
                let error = classify_read_error(e);
                self.connection_lost(generation, error.duplicate()).await;
                return Err(error);
            }
        }
        self.inner.metrics.command_sent();

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(Ok(response))) => {
                self.inner.metrics.command_completed();
                Ok(response)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(RconError::NoResponse),
            Err(_) => {
                self.inner.metrics.command_timed_out();
                warn!(command, "Command timed out");
                Err(RconError::Timeout)
            }
        }
    }

    /// Execute `ListPlayers`, publish the parsed list and return it
    pub async fn list_players(&self) -> Result<PlayerList> {
        let raw = self.execute("ListPlayers").await?;
        let players = parse_players(&raw);
        self.inner.bus.publish(TypedEvent::ListPlayers {
            players: players.clone(),
            raw,
        });
        Ok(players)
    }

    /// Execute `ListSquads`, publish the parsed squads and return them
    pub async fn list_squads(&self) -> Result<Vec<Squad>> {
        let raw = self.execute("ListSquads").await?;
        let squads = parse_squads(&raw);
        self.inner.bus.publish(TypedEvent::ListSquads {
            squads: squads.clone(),
            raw,
        });
        Ok(squads)
    }

    /// Tear down the connection identified by `generation` after a failure
    pub(crate) async fn connection_lost(&self, generation: u64, error: RconError) {
        let token = {
            let mut lifecycle = lock(&self.inner.lifecycle);
            if lifecycle.generation != generation {
                return;
            }
            match lifecycle.connection.take() {
                Some(token) => token,
                None => return,
            }
        };
        token.cancel();

        self.inner.writer.lock().await.take();
        self.fail_pending(error.duplicate());
        self.set_state(SessionState::Disconnected);

        warn!(error = %error, "RCON connection lost");
        self.publish_error(&error);
        self.inner.bus.publish(TypedEvent::Disconnected {
            reason: error.to_string(),
        });

        if self.inner.config.auto_reconnect
            && error.is_recoverable()
            && !self.shutdown_token().is_cancelled()
        {
            supervisor::spawn_reconnect(self.clone());
        }
    }

    /// Close the connection and stop all background work
    ///
    /// A caller blocked in [`Session::execute`] returns `ConnectionClosed`.
    /// No reconnect is attempted afterwards.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let token = {
            let mut lifecycle = lock(&self.inner.lifecycle);
            lifecycle.shutdown.cancel();
            lifecycle.generation += 1;
            lifecycle.connection.take()
        };
        if let Some(token) = token {
            token.cancel();
        }

        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "Error shutting down write half");
            }
        }
        self.fail_pending(RconError::ConnectionClosed);

        let previous = self.inner.state.send_replace(SessionState::Disconnected);
        if previous != SessionState::Disconnected {
            self.inner.bus.publish(TypedEvent::Disconnected {
                reason: RconError::ConnectionClosed.to_string(),
            });
        }
        if self.inner.reconnecting.load(Ordering::Acquire) {
            debug!("Reconnect loop will stop on shutdown");
        }
        info!("RCON session closed");
    }
}
