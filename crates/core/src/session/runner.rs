//! Async driver wiring the session node to its collaborators.
//!
//! The runner owns the node and drives it from a single select loop: one
//! message in, its actions out, executed before the next message is taken.
//! Spawned side effects (dials, calls, capture requests) report their
//! completions and failures back into the loop as events, so the node itself
//! never awaits anything.

use crate::capture::CaptureSource;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::identity::PeerId;
use crate::media::MediaStream;
use crate::session::events::{Action, Command, SessionEvent, TransportEvent};
use crate::session::node::SessionNode;
use crate::transport::PeerTransport;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// A remote stream routed to the playback/visualization sink.
#[derive(Debug, Clone)]
pub struct PlaybackRoute {
    /// The peer the stream came from
    pub remote: PeerId,
    /// The remote stream
    pub stream: Arc<MediaStream>,
}

/// Handle the embedding application keeps while the runner is live.
///
/// Dropping the handle without sending [`Command::Shutdown`] shuts the
/// session down on the next loop turn.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    playback: mpsc::Receiver<PlaybackRoute>,
    identity: watch::Receiver<Option<PeerId>>,
    peers: watch::Receiver<Vec<PeerId>>,
}

impl SessionHandle {
    /// Send an operator command to the node.
    pub async fn send(&self, cmd: Command) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// The next remote stream routed to playback.
    pub async fn next_playback(&mut self) -> Option<PlaybackRoute> {
        self.playback.recv().await
    }

    /// The node's own identity, once assigned (e.g. for out-of-band sharing).
    pub fn identity(&self) -> Option<PeerId> {
        self.identity.borrow().clone()
    }

    /// Wait until the identity provider has delivered an identity.
    pub async fn wait_identity(&mut self) -> Result<PeerId> {
        loop {
            if let Some(id) = self.identity.borrow_and_update().clone() {
                return Ok(id);
            }
            self.identity
                .changed()
                .await
                .map_err(|_| Error::ChannelClosed)?;
        }
    }

    /// Currently joined peer identities, in join order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.borrow().clone()
    }

    /// Wait until the joined-peer list satisfies `pred`.
    pub async fn wait_for_peers(
        &mut self,
        pred: impl Fn(&[PeerId]) -> bool,
    ) -> Result<Vec<PeerId>> {
        loop {
            {
                let peers = self.peers.borrow_and_update();
                if pred(&peers) {
                    return Ok(peers.clone());
                }
            }
            self.peers
                .changed()
                .await
                .map_err(|_| Error::ChannelClosed)?;
        }
    }
}

/// Drives one [`SessionNode`] against a transport and a capture source.
pub struct SessionRunner {
    node: SessionNode,
    transport: Arc<dyn PeerTransport>,
    capture: Arc<dyn CaptureSource>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    commands_rx: mpsc::Receiver<Command>,
    internal_tx: mpsc::Sender<SessionEvent>,
    internal_rx: mpsc::Receiver<SessionEvent>,
    playback_tx: mpsc::Sender<PlaybackRoute>,
    identity_tx: watch::Sender<Option<PeerId>>,
    peers_tx: watch::Sender<Vec<PeerId>>,
}

impl SessionRunner {
    /// A runner with default channel capacities.
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        transport_rx: mpsc::Receiver<TransportEvent>,
        capture: Arc<dyn CaptureSource>,
    ) -> (Self, SessionHandle) {
        Self::with_config(transport, transport_rx, capture, SessionConfig::default())
    }

    /// A runner with explicit channel capacities.
    pub fn with_config(
        transport: Arc<dyn PeerTransport>,
        transport_rx: mpsc::Receiver<TransportEvent>,
        capture: Arc<dyn CaptureSource>,
        config: SessionConfig,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer);
        let (internal_tx, internal_rx) = mpsc::channel(config.internal_buffer);
        let (playback_tx, playback_rx) = mpsc::channel(config.playback_buffer);
        let (identity_tx, identity_rx) = watch::channel(None);
        let (peers_tx, peers_rx) = watch::channel(Vec::new());

        let runner = Self {
            node: SessionNode::new(),
            transport,
            capture,
            transport_rx,
            commands_rx,
            internal_tx,
            internal_rx,
            playback_tx,
            identity_tx,
            peers_tx,
        };
        let handle = SessionHandle {
            commands: commands_tx,
            playback: playback_rx,
            identity: identity_rx,
            peers: peers_rx,
        };
        (runner, handle)
    }

    /// The node, for inspection before the loop starts.
    pub fn node(&self) -> &SessionNode {
        &self.node
    }

    /// Drive the node until shutdown.
    pub async fn run(mut self) {
        loop {
            let event = tokio::select! {
                biased;
                // Internal completions first: a capture result or an action
                // failure must correct state before new work lands on it.
                Some(event) = self.internal_rx.recv() => event,
                cmd = self.commands_rx.recv() => match cmd {
                    Some(cmd) => SessionEvent::Command(cmd),
                    // Handle dropped without an explicit shutdown.
                    None => SessionEvent::Command(Command::Shutdown),
                },
                Some(event) = self.transport_rx.recv() => SessionEvent::Transport(event),
                else => break,
            };

            let actions = self.node.handle(event);
            for action in actions {
                self.execute(action);
            }
            self.publish_state();

            if self.node.is_closed() {
                if let Err(err) = self.transport.close().await {
                    warn!(%err, "transport close failed");
                }
                break;
            }
        }
        debug!("session loop ended");
    }

    fn execute(&self, action: Action) {
        match action {
            Action::OpenConnection { remote } => {
                let transport = Arc::clone(&self.transport);
                let feedback = self.internal_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = transport.open_connection(&remote).await {
                        warn!(peer = %remote, %err, "dial failed");
                        let _ = feedback
                            .send(
                                TransportEvent::ConnectionFailed {
                                    remote,
                                    reason: err.to_string(),
                                }
                                .into(),
                            )
                            .await;
                    }
                });
            }
            Action::PlaceCall { remote, stream } => {
                let transport = Arc::clone(&self.transport);
                let feedback = self.internal_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = transport.place_call(&remote, stream).await {
                        warn!(peer = %remote, %err, "outbound call failed");
                        let _ = feedback
                            .send(
                                TransportEvent::CallFailed {
                                    remote,
                                    reason: err.to_string(),
                                }
                                .into(),
                            )
                            .await;
                    }
                });
            }
            Action::AnswerCall { remote } => {
                let transport = Arc::clone(&self.transport);
                let feedback = self.internal_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = transport.answer_call(&remote).await {
                        warn!(peer = %remote, %err, "answer failed");
                        let _ = feedback
                            .send(
                                TransportEvent::CallFailed {
                                    remote,
                                    reason: err.to_string(),
                                }
                                .into(),
                            )
                            .await;
                    }
                });
            }
            Action::RequestCapture { source } => {
                let capture = Arc::clone(&self.capture);
                let feedback = self.internal_tx.clone();
                tokio::spawn(async move {
                    let result = capture.request_stream(source).await;
                    let _ = feedback
                        .send(SessionEvent::CaptureReady { source, result })
                        .await;
                });
            }
            Action::RoutePlayback { remote, stream } => {
                if self
                    .playback_tx
                    .try_send(PlaybackRoute { remote, stream })
                    .is_err()
                {
                    warn!("playback sink unavailable; remote stream dropped");
                }
            }
        }
    }

    fn publish_state(&self) {
        let identity = self.node.identity().cloned();
        self.identity_tx.send_if_modified(|current| {
            if *current != identity {
                *current = identity;
                true
            } else {
                false
            }
        });

        let peers = self.node.peers();
        self.peers_tx.send_if_modified(|current| {
            if *current != peers {
                *current = peers;
                true
            } else {
                false
            }
        });
    }
}
