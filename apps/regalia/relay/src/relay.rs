//! The broadcast relay.
//!
//! A single task owns the set of open connections and performs every
//! snapshot write. Connect, message and close events all travel through one
//! queue, so they are handled strictly one after another and fan-out never
//! races with a change to the connection set.
//!
//! Every frame is delivered to every open connection, the sender included.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use metrics::{counter, gauge};
use slab::Slab;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::snapshot::SnapshotCache;

/// Index of an open connection inside the relay's slab.
pub type ConnectionId = usize;

/// A payload exactly as it arrived, shared between all outbound queues.
pub type Frame = Arc<str>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay loop has stopped")]
    Stopped,
}

/// Outbound side of one registered connection.
pub struct Subscription {
    pub id: ConnectionId,
    pub frames: mpsc::UnboundedReceiver<Frame>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: usize,
}

enum RelayEvent {
    Connect {
        outbound: mpsc::UnboundedSender<Frame>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Message {
        from: ConnectionId,
        payload: Frame,
    },
    Close {
        id: ConnectionId,
    },
}

/// Cloneable entry point into the relay loop.
#[derive(Clone)]
pub struct RelayHandle {
    events: mpsc::UnboundedSender<RelayEvent>,
    open: Arc<AtomicUsize>,
    snapshot: SnapshotCache,
}

impl RelayHandle {
    /// Starts the relay loop on the current runtime.
    pub fn spawn(snapshot: SnapshotCache) -> (Self, JoinHandle<()>) {
        let (events, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicUsize::new(0));
        let relay = RelayLoop {
            connections: Slab::new(),
            snapshot: snapshot.clone(),
            open: Arc::clone(&open),
        };
        let task = tokio::spawn(relay.run(rx));
        (
            Self {
                events,
                open,
                snapshot,
            },
            task,
        )
    }

    /// Registers a new connection. Frames published after this returns are
    /// delivered to the returned subscription.
    pub async fn connect(&self) -> Result<Subscription, RelayError> {
        let (outbound, frames) = mpsc::unbounded_channel();
        let (reply, id) = oneshot::channel();
        self.events
            .send(RelayEvent::Connect { outbound, reply })
            .map_err(|_| RelayError::Stopped)?;
        let id = id.await.map_err(|_| RelayError::Stopped)?;
        Ok(Subscription { id, frames })
    }

    pub fn publish(&self, from: ConnectionId, payload: impl Into<Frame>) -> Result<(), RelayError> {
        self.events
            .send(RelayEvent::Message {
                from,
                payload: payload.into(),
            })
            .map_err(|_| RelayError::Stopped)
    }

    /// Drops `id` from the open set. Other connections are not told.
    pub fn disconnect(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.events
            .send(RelayEvent::Close { id })
            .map_err(|_| RelayError::Stopped)
    }

    /// Number of open connections as of the last handled event.
    pub fn connection_count(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> &SnapshotCache {
        &self.snapshot
    }
}

struct RelayLoop {
    connections: Slab<mpsc::UnboundedSender<Frame>>,
    snapshot: SnapshotCache,
    open: Arc<AtomicUsize>,
}

impl RelayLoop {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<RelayEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        debug!("relay loop finished; all handles dropped");
    }

    fn handle(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connect { outbound, reply } => {
                let id = self.connections.insert(outbound);
                self.publish_count();
                counter!("regalia_relay_connections_total", 1);
                if reply.send(id).is_err() {
                    // The caller went away before learning its id.
                    self.connections.remove(id);
                    self.publish_count();
                    return;
                }
                info!(connection_id = id, open = self.connections.len(), "connection opened");
            }
            RelayEvent::Message { from, payload } => {
                if let Err(err) = self.snapshot.on_message(&payload) {
                    counter!("regalia_relay_decode_failures_total", 1);
                    debug!(connection_id = from, error = %err, "frame kept out of snapshot");
                }
                let fan_out = self.broadcast(&payload);
                counter!("regalia_relay_frames_total", 1);
                debug!(
                    connection_id = from,
                    bytes = payload.len(),
                    delivered = fan_out.delivered,
                    failed = fan_out.failed,
                    "frame relayed"
                );
            }
            RelayEvent::Close { id } => {
                if self.connections.try_remove(id).is_some() {
                    self.publish_count();
                    info!(connection_id = id, open = self.connections.len(), "connection closed");
                }
            }
        }
    }

    /// Queues `payload` on every open connection. A connection whose writer
    /// has already gone is skipped; it leaves the set through its own close.
    fn broadcast(&self, payload: &Frame) -> FanOut {
        let mut fan_out = FanOut::default();
        for (id, outbound) in self.connections.iter() {
            match outbound.send(Arc::clone(payload)) {
                Ok(()) => fan_out.delivered += 1,
                Err(_) => {
                    fan_out.failed += 1;
                    counter!("regalia_relay_send_failures_total", 1);
                    debug!(connection_id = id, "send skipped; connection is closing");
                }
            }
        }
        fan_out
    }

    fn publish_count(&self) {
        let open = self.connections.len();
        self.open.store(open, Ordering::Release);
        gauge!("regalia_relay_connections", open as f64);
    }
}
