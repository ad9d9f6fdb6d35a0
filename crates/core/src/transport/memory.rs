//! In-process transport hub.
//!
//! Connects session nodes running inside one process: identities are
//! assigned on registration, connection opens and calls are delivered
//! symmetrically to both ends, and link failures can be injected. Used by
//! the integration tests and the examples, and usable by embedders that run
//! several nodes in one process.

use super::PeerTransport;
use crate::error::{Error, Result};
use crate::identity::PeerId;
use crate::media::MediaStream;
use crate::session::TransportEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Event queue depth per registered node.
const EVENT_BUFFER: usize = 64;

#[derive(Default)]
struct HubInner {
    nodes: HashMap<PeerId, mpsc::Sender<TransportEvent>>,
    /// Open links as normalized (low, high) identity pairs.
    links: HashSet<(PeerId, PeerId)>,
    /// Calls placed but not yet answered, keyed by (caller, callee).
    pending_calls: HashMap<(PeerId, PeerId), Arc<MediaStream>>,
}

impl HubInner {
    fn deliver(&self, to: &PeerId, event: TransportEvent) {
        if let Some(tx) = self.nodes.get(to) {
            // A full or dropped queue means the node is gone or wedged; the
            // hub never blocks on a slow consumer.
            let _ = tx.try_send(event);
        }
    }

    fn drop_node(&mut self, id: &PeerId) {
        if self.nodes.remove(id).is_none() {
            return;
        }
        let severed: Vec<(PeerId, PeerId)> = self
            .links
            .iter()
            .filter(|(a, b)| a == id || b == id)
            .cloned()
            .collect();
        for link in severed {
            self.links.remove(&link);
            let other = if &link.0 == id { &link.1 } else { &link.0 };
            self.deliver(
                other,
                TransportEvent::ConnectionClosed { remote: id.clone() },
            );
        }
        self.pending_calls
            .retain(|(caller, callee), _| caller != id && callee != id);
    }
}

fn link_key(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// An in-process signaling/connection hub.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    /// An empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under a freshly generated identity. Returns the
    /// node's transport handle and its event receiver; the identity arrives
    /// asynchronously as the first event, like the real service.
    pub fn register(&self) -> (MemoryTransport, mpsc::Receiver<TransportEvent>) {
        self.register_as(Uuid::new_v4().to_string())
    }

    /// Register a node under a caller-chosen identity.
    pub fn register_as(
        &self,
        id: impl Into<PeerId>,
    ) -> (MemoryTransport, mpsc::Receiver<TransportEvent>) {
        let id = id.into();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        {
            let mut inner = self.inner.lock();
            inner.nodes.insert(id.clone(), tx.clone());
        }
        debug!(identity = %id, "node registered with hub");
        let _ = tx.try_send(TransportEvent::IdentityAssigned(id.clone()));
        (
            MemoryTransport {
                local: id,
                hub: Arc::clone(&self.inner),
            },
            rx,
        )
    }

    /// Sever the link between two peers, surfacing a failure on both ends.
    pub fn fail_link(&self, a: &PeerId, b: &PeerId, reason: &str) {
        let mut inner = self.inner.lock();
        if !inner.links.remove(&link_key(a, b)) {
            return;
        }
        inner.deliver(
            a,
            TransportEvent::ConnectionFailed {
                remote: b.clone(),
                reason: reason.to_string(),
            },
        );
        inner.deliver(
            b,
            TransportEvent::ConnectionFailed {
                remote: a.clone(),
                reason: reason.to_string(),
            },
        );
    }

    /// Drop a peer entirely; its links close on the surviving ends.
    pub fn drop_peer(&self, id: &PeerId) {
        self.inner.lock().drop_node(id);
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }
}

/// One node's handle onto a [`MemoryHub`].
pub struct MemoryTransport {
    local: PeerId,
    hub: Arc<Mutex<HubInner>>,
}

impl MemoryTransport {
    /// The identity this transport was registered under.
    pub fn local_id(&self) -> &PeerId {
        &self.local
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn open_connection(&self, remote: &PeerId) -> Result<()> {
        let mut inner = self.hub.lock();
        if !inner.nodes.contains_key(remote) {
            return Err(Error::UnknownPeer(remote.clone()));
        }
        inner.links.insert(link_key(&self.local, remote));
        // The callee sees the request, then both ends converge on open.
        inner.deliver(
            remote,
            TransportEvent::ConnectionRequested {
                remote: self.local.clone(),
            },
        );
        inner.deliver(
            remote,
            TransportEvent::ConnectionOpened {
                remote: self.local.clone(),
            },
        );
        inner.deliver(
            &self.local,
            TransportEvent::ConnectionOpened {
                remote: remote.clone(),
            },
        );
        Ok(())
    }

    async fn place_call(&self, remote: &PeerId, stream: Arc<MediaStream>) -> Result<()> {
        let mut inner = self.hub.lock();
        if !inner.nodes.contains_key(remote) {
            return Err(Error::UnknownPeer(remote.clone()));
        }
        inner
            .pending_calls
            .insert((self.local.clone(), remote.clone()), stream);
        inner.deliver(
            remote,
            TransportEvent::CallOffered {
                remote: self.local.clone(),
            },
        );
        Ok(())
    }

    async fn answer_call(&self, remote: &PeerId) -> Result<()> {
        let mut inner = self.hub.lock();
        match inner
            .pending_calls
            .remove(&(remote.clone(), self.local.clone()))
        {
            Some(stream) => {
                inner.deliver(
                    &self.local,
                    TransportEvent::CallStream {
                        remote: remote.clone(),
                        stream,
                    },
                );
                Ok(())
            }
            None => Err(Error::Call {
                peer: remote.clone(),
                reason: "no pending call".into(),
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        self.hub.lock().drop_node(&self.local);
        Ok(())
    }
}
