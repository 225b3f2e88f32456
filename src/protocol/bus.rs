//! # Event Bus
//!
//! Fans typed events out to any number of subscribers.
//!
//! Every [`Subscription`] owns a bounded queue. Publishing never waits: when a
//! subscriber's queue is full the event is dropped for that subscriber only and
//! counted, so one slow consumer cannot stall the read loop or the others.
//! Unsubscribing the [`SubscriptionHandle`] or dropping the subscription ends
//! delivery.

use futures::Stream;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::protocol::event::TypedEvent;
use crate::utils::metrics::Metrics;

/// Default per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

/// Opaque identifier of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    tx: mpsc::Sender<TypedEvent>,
    active: Arc<AtomicBool>,
}

/// Typed publish/subscribe fan-out.
///
/// Every subscriber owns a bounded queue. `publish` never waits: a full queue
/// drops the event for that subscriber only, so one slow consumer cannot stall
/// the others or the publisher.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<SubscriptionHandle, Subscriber>>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
    metrics: Option<Arc<Metrics>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Bus whose subscriber queues hold `capacity` events (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
            metrics: None,
        }
    }

    /// Record published and dropped events into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn subscribe(&self) -> (SubscriptionHandle, Subscription) {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        let active = Arc::new(AtomicBool::new(true));

        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handle,
                Subscriber {
                    tx,
                    active: active.clone(),
                },
            );
        debug!(%handle, "Subscriber registered");

        (handle, Subscription { handle, rx, active })
    }

    /// Remove a subscription; returns false if the handle was unknown
    ///
    /// Events already queued for the handle are never yielded afterwards.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);

        match removed {
            Some(sub) => {
                sub.active.store(false, Ordering::Release);
                debug!(%handle, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Fan `event` out to every live subscriber; returns how many queues accepted it
    pub fn publish(&self, event: TypedEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);

            for (handle, sub) in subscribers.iter() {
                if !sub.active.load(Ordering::Acquire) {
                    continue;
                }
                match sub.tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(%handle, event = event.name(), "Subscriber queue full, dropping event");
                        if let Some(metrics) = &self.metrics {
                            metrics.event_dropped();
                        }
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*handle),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for handle in closed {
                subscribers.remove(&handle);
                debug!(%handle, "Pruned subscriber with dropped receiver");
            }
        }

        if delivered > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.event_published();
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Delivery side of a subscription
///
/// Yields events in publish order until the subscription is removed from the
/// bus, then yields `None`.
pub struct Subscription {
    handle: SubscriptionHandle,
    rx: mpsc::Receiver<TypedEvent>,
    active: Arc<AtomicBool>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<TypedEvent> {
        if !self.is_active() {
            return None;
        }
        let event = self.rx.recv().await?;
        self.is_active().then_some(event)
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<TypedEvent> {
        if !self.is_active() {
            return None;
        }
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = TypedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TypedEvent>> {
        let this = self.get_mut();
        if !this.is_active() {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) if this.is_active() => Poll::Ready(Some(event)),
            Poll::Ready(_) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
