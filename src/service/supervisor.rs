//! Keepalive and reconnect supervision for a [`Session`].
//!
//! Each established connection gets a keepalive task bound to that
//! connection's cancellation token. A lost connection starts at most one
//! reconnect loop per session, which stops on `close()`, on a fatal error or
//! once the configured attempt limit is reached.

use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{constants, RconError};
use crate::protocol::event::TypedEvent;
use crate::service::session::{Session, SessionState};

/// Start the keepalive task for the connection identified by `generation`
pub(crate) fn spawn_keepalive(
    session: Session,
    token: CancellationToken,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move { keepalive_loop(session, token, generation).await })
}

async fn keepalive_loop(session: Session, token: CancellationToken, generation: u64) {
    let period = session.config().keepalive_interval;
    let probe_timeout = session.config().keepalive_timeout;
    let command = session.config().keepalive_command.clone();

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if session.state() != SessionState::Ready {
            continue;
        }

        // The deadline starts once the command is written, not while it queues
        match session.execute_within(&command, probe_timeout).await {
            Ok(_) => trace!(generation, "Keepalive acknowledged"),
            Err(_) if token.is_cancelled() => break,
            Err(RconError::ConnectionClosed) => break,
            Err(e) => {
                warn!(generation, error = %e, "{}", constants::ERR_KEEPALIVE_FAILED);
                session
                    .connection_lost(
                        generation,
                        RconError::ConnectionLost(constants::ERR_KEEPALIVE_FAILED.into()),
                    )
                    .await;
                break;
            }
        }
    }

    debug!(generation, "Keepalive stopped");
}

/// Start the reconnect loop unless one is already running
pub(crate) fn spawn_reconnect(session: Session) {
    if session
        .inner
        .reconnecting
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        session.inner.reconnect_refused.store(true, Ordering::Release);
        debug!("Reconnect loop already running");
        return;
    }

    tokio::spawn(async move {
        loop {
            reconnect_loop(&session).await;
            session.inner.reconnecting.store(false, Ordering::Release);

            // A loss that raced with the end of the loop was refused above
            let refused = session.inner.reconnect_refused.swap(false, Ordering::AcqRel);
            let retry = refused
                && session.state() == SessionState::Disconnected
                && !session.shutdown_token().is_cancelled();
            if !retry
                || session
                    .inner
                    .reconnecting
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                break;
            }
        }
    });
}

async fn reconnect_loop(session: &Session) {
    let shutdown = session.shutdown_token();
    let delay = session.config().reconnect_delay;
    let max_attempts = session.config().max_reconnect_attempts;

    let mut ticker = interval_at(Instant::now() + delay, delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(attempt, "Reconnect cancelled by shutdown");
                return;
            }
            _ = ticker.tick() => {}
        }

        attempt += 1;
        session.metrics().reconnect_attempt();
        info!(attempt, address = %session.config().address(), "Attempting reconnect");

        match session.connect().await {
            Ok(()) => {
                info!(attempt, "Reconnected");
                return;
            }
            Err(RconError::ConnectionClosed) => return,
            Err(e) if !e.is_recoverable() => {
                error!(attempt, error = %e, "Reconnect stopped on fatal error");
                return;
            }
            Err(e) => {
                warn!(attempt, error = %e, "Reconnect attempt failed");
                if max_attempts > 0 && attempt >= max_attempts {
                    error!(attempt, "{}", constants::ERR_RECONNECT_EXHAUSTED);
                    let exhausted = RconError::ConnectionLost(constants::ERR_RECONNECT_EXHAUSTED.into());
                    session.bus().publish(TypedEvent::Error {
                        kind: exhausted.kind(),
                        message: exhausted.to_string(),
                    });
                    return;
                }
            }
        }
    }
}
