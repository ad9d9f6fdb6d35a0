//! The session node: one participant's connection-lifecycle state machine.
//!
//! The node is the single point where transport events, capture completions,
//! and operator commands are translated into registry mutations and outbound
//! actions. Messages are handled synchronously to completion, one at a time;
//! anything asynchronous (dialing, calling, capture) is returned as an
//! [`Action`] whose eventual completion or failure re-enters as an event.
//!
//! Failure policy: every transport-level error is absorbed here, logged, and
//! converted into a local state correction (remove the affected connection or
//! session). One peer's failure is invisible to all others.

use crate::identity::PeerId;
use crate::media::{BroadcastPipeline, MediaSession, MediaStream, SourceKind};
use crate::session::events::{Action, Command, SessionEvent, TransportEvent};
use crate::session::registry::{ChannelState, ConnectionRegistry, PeerConnection};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// The two mutually exclusive roles a node can hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sends the local stream to every joined peer
    Broadcaster,
    /// Dials a broadcaster and plays the received stream
    #[default]
    Listener,
}

/// Node lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// Waiting for the identity provider.
    Uninitialized,
    /// Identity assigned; operating.
    Identified(PeerId),
    /// Identity acquisition failed; the node cannot accept connections.
    Failed,
    /// Shut down; no further events are processed.
    Closed,
}

/// One participant's session state machine.
#[derive(Debug)]
pub struct SessionNode {
    lifecycle: Lifecycle,
    role: Role,
    registry: ConnectionRegistry,
    broadcast: BroadcastPipeline,
    /// Connections still negotiating, keyed by remote identity. Promoted
    /// into the registry on open, discarded on close or failure.
    pending: IndexMap<PeerId, PeerConnection>,
    /// Inbound media sessions keyed by remote identity. A second call from
    /// the same remote replaces the first.
    inbound: IndexMap<PeerId, MediaSession>,
}

impl Default for SessionNode {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionNode {
    /// A fresh, unidentified node in the listener role.
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            role: Role::default(),
            registry: ConnectionRegistry::new(),
            broadcast: BroadcastPipeline::default(),
            pending: IndexMap::new(),
            inbound: IndexMap::new(),
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// The assigned session identity, once the provider has delivered it.
    pub fn identity(&self) -> Option<&PeerId> {
        match &self.lifecycle {
            Lifecycle::Identified(id) => Some(id),
            _ => None,
        }
    }

    /// Current role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the node has shut down.
    pub fn is_closed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Closed)
    }

    /// The connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Joined peer identities in join order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.registry.peer_ids().cloned().collect()
    }

    /// Number of connections still negotiating.
    pub fn pending_connections(&self) -> usize {
        self.pending.len()
    }

    /// The broadcast pipeline.
    pub fn broadcast(&self) -> &BroadcastPipeline {
        &self.broadcast
    }

    /// Whether a broadcast is active.
    pub fn is_active(&self) -> bool {
        self.broadcast.is_active()
    }

    /// Inbound media sessions in arrival order.
    pub fn inbound_sessions(&self) -> impl Iterator<Item = &MediaSession> {
        self.inbound.values()
    }

    /// Single entry point: apply one message, return the side effects to run.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Action> {
        if self.is_closed() {
            trace!(?event, "event after shutdown ignored");
            return Vec::new();
        }
        match event {
            SessionEvent::Transport(event) => self.handle_transport(event),
            SessionEvent::Command(cmd) => self.handle_command(cmd),
            SessionEvent::CaptureReady { source, result } => {
                let peers = self.peers();
                match self.broadcast.on_capture_ready(source, result, &peers) {
                    Some(stream) => peers
                        .into_iter()
                        .map(|remote| Action::PlaceCall {
                            remote,
                            stream: Arc::clone(&stream),
                        })
                        .collect(),
                    None => Vec::new(),
                }
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) -> Vec<Action> {
        trace!(event = event.name(), "transport event");
        match event {
            TransportEvent::IdentityAssigned(id) => {
                match &self.lifecycle {
                    Lifecycle::Uninitialized => {
                        info!(identity = %id, "session identity assigned");
                        self.lifecycle = Lifecycle::Identified(id);
                    }
                    Lifecycle::Identified(current) => {
                        warn!(%current, ignored = %id, "duplicate identity assignment ignored");
                    }
                    Lifecycle::Failed | Lifecycle::Closed => {
                        warn!(ignored = %id, "identity assigned to a dead node");
                    }
                }
                Vec::new()
            }
            TransportEvent::ConnectionRequested { remote } => {
                // Accepted unconditionally; the peer joins once its channel
                // reaches the open state.
                debug!(peer = %remote, "inbound connection negotiating");
                self.pending
                    .insert(remote.clone(), PeerConnection::opening(remote));
                Vec::new()
            }
            TransportEvent::ConnectionOpened { remote } => self.on_connection_opened(remote),
            TransportEvent::ConnectionClosed { remote } => {
                self.drop_peer(&remote, ChannelState::Closed);
                Vec::new()
            }
            TransportEvent::ConnectionFailed { remote, reason } => {
                warn!(peer = %remote, %reason, "connection failed");
                self.drop_peer(&remote, ChannelState::Errored);
                Vec::new()
            }
            TransportEvent::CallOffered { remote } => {
                // Answer with no outbound media; the remote stream attaches
                // when it becomes available.
                debug!(peer = %remote, "answering inbound call");
                self.inbound
                    .insert(remote.clone(), MediaSession::inbound(remote.clone()));
                vec![Action::AnswerCall { remote }]
            }
            TransportEvent::CallStream { remote, stream } => {
                match self.inbound.get_mut(&remote) {
                    Some(session) => {
                        session.attach(Arc::clone(&stream));
                        debug!(peer = %remote, stream = stream.id(), "remote stream attached");
                        vec![Action::RoutePlayback { remote, stream }]
                    }
                    None => {
                        warn!(peer = %remote, "stream for unknown call discarded");
                        Vec::new()
                    }
                }
            }
            TransportEvent::CallFailed { remote, reason } => {
                warn!(peer = %remote, %reason, "call failed");
                self.inbound.shift_remove(&remote);
                self.broadcast.drop_session(&remote);
                Vec::new()
            }
            TransportEvent::ProviderError { reason } => {
                if matches!(self.lifecycle, Lifecycle::Uninitialized) {
                    error!(%reason, "identity provider failed; node cannot accept connections");
                    self.lifecycle = Lifecycle::Failed;
                } else {
                    warn!(%reason, "transport error");
                }
                Vec::new()
            }
        }
    }

    fn on_connection_opened(&mut self, remote: PeerId) -> Vec<Action> {
        self.pending.shift_remove(&remote);
        if !self.registry.insert(PeerConnection::open(remote.clone())) {
            debug!(peer = %remote, "connection already registered");
            return Vec::new();
        }
        info!(peer = %remote, joined = self.registry.len(), "peer joined");
        // Standing fan-out: a peer joining mid-broadcast gets the current
        // stream immediately.
        match self.broadcast.fan_out_to(&remote) {
            Some(stream) => vec![Action::PlaceCall { remote, stream }],
            None => Vec::new(),
        }
    }

    fn drop_peer(&mut self, remote: &PeerId, state: ChannelState) {
        if self.pending.shift_remove(remote).is_some() {
            debug!(peer = %remote, ?state, "connection ended before opening");
        }
        if let Some(mut conn) = self.registry.remove(remote) {
            conn.set_state(state);
            info!(peer = %remote, ?state, remaining = self.registry.len(), "peer left");
        }
        self.broadcast.drop_session(remote);
    }

    fn handle_command(&mut self, cmd: Command) -> Vec<Action> {
        match cmd {
            Command::SetRole(role) => {
                self.set_role(role);
                Vec::new()
            }
            Command::SetSource(source) => {
                self.broadcast.set_source(source);
                Vec::new()
            }
            Command::StartBroadcast => self.start_broadcast(),
            Command::StopBroadcast => {
                self.broadcast.stop();
                Vec::new()
            }
            Command::ToggleBroadcast => {
                if self.broadcast.is_active() {
                    self.broadcast.stop();
                    Vec::new()
                } else {
                    self.start_broadcast()
                }
            }
            Command::Connect { remote } => self.connect(remote),
            Command::Shutdown => {
                self.shutdown();
                Vec::new()
            }
        }
    }

    fn set_role(&mut self, role: Role) {
        if role == self.role {
            return;
        }
        // Never leave a dangling stream behind a role change.
        if self.broadcast.is_active() || self.broadcast.is_capture_pending() {
            self.broadcast.stop();
        }
        info!(?role, "role changed");
        self.role = role;
    }

    fn start_broadcast(&mut self) -> Vec<Action> {
        if self.role != Role::Broadcaster {
            warn!("start ignored: node is not the broadcaster");
            return Vec::new();
        }
        match self.broadcast.begin_capture() {
            Some(source) => vec![Action::RequestCapture { source }],
            None => Vec::new(),
        }
    }

    fn connect(&mut self, remote: PeerId) -> Vec<Action> {
        if self.identity().is_none() {
            warn!(peer = %remote, "connect ignored: node has no session identity");
            return Vec::new();
        }
        if self.registry.contains(&remote) {
            debug!(peer = %remote, "already connected");
            return Vec::new();
        }
        if self.pending.contains_key(&remote) {
            debug!(peer = %remote, "already dialing");
            return Vec::new();
        }
        info!(peer = %remote, "dialing");
        self.pending
            .insert(remote.clone(), PeerConnection::opening(remote.clone()));
        vec![Action::OpenConnection { remote }]
    }

    fn shutdown(&mut self) {
        info!("session node shutting down");
        self.broadcast.stop();
        self.registry.clear();
        self.pending.clear();
        self.inbound.clear();
        self.lifecycle = Lifecycle::Closed;
    }
}

/// Convenience for tests and embedders: the local stream while broadcasting.
impl SessionNode {
    /// The live local stream, if a broadcast is active.
    pub fn local_stream(&self) -> Option<&Arc<MediaStream>> {
        self.broadcast.local_stream()
    }

    /// The preferred capture source.
    pub fn source(&self) -> SourceKind {
        self.broadcast.source()
    }
}
