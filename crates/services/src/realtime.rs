//! # RealtimeBus
//!
//! Connection registry keyed by authenticated identity. An identity may hold
//! any number of live connections (tabs, devices). Public events fan out to
//! every connection; private-message events reach only the connections of
//! the sender and the receiver.
//!
//! Delivery is at-most-once. Each connection owns a bounded queue and a full
//! queue drops the event for that connection instead of stalling the
//! publisher. Nothing is buffered for identities with no live connection;
//! clients reconcile by re-querying after reconnecting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use domains::{Audience, EventPublisher, LiveEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub type ConnectionId = u64;

/// Serialized event frame shared by every recipient of one publish.
pub type Frame = Arc<str>;

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub connections: u64,
}

struct Registry {
    connections: DashMap<Uuid, HashMap<ConnectionId, mpsc::Sender<Frame>>>,
    next_id: AtomicU64,
    buffer: usize,
    counters: Counters,
}

impl Registry {
    fn remove(&self, identity: Uuid, id: ConnectionId) {
        if let Some(mut conns) = self.connections.get_mut(&identity) {
            conns.remove(&id);
        }
        self.connections.remove_if(&identity, |_, conns| conns.is_empty());
        debug!(%identity, connection = id, "live connection closed");
    }

    fn offer(&self, identity: Uuid, id: ConnectionId, tx: &mpsc::Sender<Frame>, frame: &Frame) -> Offer {
        match tx.try_send(frame.clone()) {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                Offer::Delivered
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(%identity, connection = id, "live queue full, event dropped");
                Offer::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

enum Offer {
    Delivered,
    Dropped,
    Closed,
}

/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct RealtimeBus {
    inner: Arc<Registry>,
}

impl RealtimeBus {
    /// `buffer` is the per-connection queue depth.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(Registry {
                connections: DashMap::new(),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Registers a new connection for an authenticated identity. The
    /// connection unregisters itself when dropped.
    pub fn connect(&self, identity: Uuid) -> LiveConnection {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        self.inner.connections.entry(identity).or_default().insert(id, tx);
        debug!(%identity, connection = id, "live connection opened");

        LiveConnection {
            id,
            identity,
            receiver: rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.iter().map(|e| e.value().len()).sum()
    }

    pub fn connections_for(&self, identity: Uuid) -> usize {
        self.inner.connections.get(&identity).map(|c| c.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> BusStats {
        let c = &self.inner.counters;
        BusStats {
            published: c.published.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            connections: self.connection_count() as u64,
        }
    }

    fn fan_out(&self, audience: &Audience, frame: &Frame) -> usize {
        let mut handed = 0;
        let mut closed = Vec::new();

        let mut visit = |identity: Uuid, conns: &HashMap<ConnectionId, mpsc::Sender<Frame>>| {
            for (id, tx) in conns {
                match self.inner.offer(identity, *id, tx, frame) {
                    Offer::Delivered => handed += 1,
                    Offer::Dropped => {}
                    Offer::Closed => closed.push((identity, *id)),
                }
            }
        };

        match audience {
            Audience::Everyone => {
                for entry in self.inner.connections.iter() {
                    visit(*entry.key(), entry.value());
                }
            }
            Audience::Identities(ids) => {
                for identity in ids {
                    if let Some(conns) = self.inner.connections.get(identity) {
                        visit(*identity, conns.value());
                    }
                }
            }
        }

        // Receivers dropped without running cleanup (e.g. a panicked task).
        for (identity, id) in closed {
            self.inner.remove(identity, id);
        }
        handed
    }
}

impl EventPublisher for RealtimeBus {
    fn publish(&self, event: LiveEvent) -> usize {
        let frame: Frame = match serde_json::to_string(&event) {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(event = event.name(), "failed to serialize live event: {e}");
                return 0;
            }
        };
        self.inner.counters.published.fetch_add(1, Ordering::Relaxed);
        let handed = self.fan_out(&event.audience(), &frame);
        debug!(event = event.name(), recipients = handed, "live event published");
        handed
    }
}

/// One live session. Frames arrive in publish order for this connection.
pub struct LiveConnection {
    id: ConnectionId,
    identity: Uuid,
    receiver: mpsc::Receiver<Frame>,
    registry: Weak<Registry>,
}

impl LiveConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.identity, self.id);
        }
    }
}
