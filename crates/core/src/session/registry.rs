//! Connection registry: the single source of truth for joined peers.

use crate::identity::PeerId;
use indexmap::IndexMap;
use std::time::Instant;

/// Data-channel lifecycle of a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Negotiating; not yet registered
    Opening,
    /// Open and registered
    Open,
    /// Closed normally
    Closed,
    /// Failed
    Errored,
}

/// One joined remote participant.
///
/// Created when a data-connection (either direction) reaches the open state
/// and owned exclusively by the [`ConnectionRegistry`]; no other component
/// keeps a long-lived reference.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    remote: PeerId,
    state: ChannelState,
    opened_at: Instant,
}

impl PeerConnection {
    /// A connection that is still negotiating.
    pub(crate) fn opening(remote: PeerId) -> Self {
        Self {
            remote,
            state: ChannelState::Opening,
            opened_at: Instant::now(),
        }
    }

    /// A connection that just reached the open state.
    pub(crate) fn open(remote: PeerId) -> Self {
        Self {
            remote,
            state: ChannelState::Open,
            opened_at: Instant::now(),
        }
    }

    /// The remote identity.
    pub fn remote(&self) -> &PeerId {
        &self.remote
    }

    /// Current data-channel state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// When the connection opened.
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub(crate) fn set_state(&mut self, state: ChannelState) {
        self.state = state;
    }
}

/// Insertion-ordered set of currently-joined peers, keyed by remote identity.
///
/// Uniqueness is structural: the map key is the remote identity, so the
/// registry can never hold two entries for the same peer.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: IndexMap<PeerId, PeerConnection>,
}

impl ConnectionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an opened connection. Returns `false` when the identity is
    /// already registered (the existing entry is kept).
    pub fn insert(&mut self, conn: PeerConnection) -> bool {
        if self.peers.contains_key(conn.remote()) {
            return false;
        }
        self.peers.insert(conn.remote().clone(), conn);
        true
    }

    /// Remove a peer, preserving the order of the rest. Idempotent: removing
    /// a non-member returns `None`.
    pub fn remove(&mut self, remote: &PeerId) -> Option<PeerConnection> {
        self.peers.shift_remove(remote)
    }

    /// Whether a peer is registered.
    pub fn contains(&self, remote: &PeerId) -> bool {
        self.peers.contains_key(remote)
    }

    /// Number of joined peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are joined.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Joined peer identities in join order.
    pub fn peer_ids(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.keys()
    }

    /// Joined connections in join order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peers.values()
    }

    /// Remove every peer.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}
