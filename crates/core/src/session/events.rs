//! Typed messages into and actions out of the session node.
//!
//! Every transport callback and operator action becomes a [`SessionEvent`]
//! delivered to the node's single handling entry point; side effects come
//! back out as [`Action`]s for the driver to execute.

use crate::error::CaptureError;
use crate::identity::PeerId;
use crate::media::{MediaStream, SourceKind};
use crate::session::node::Role;
use std::sync::Arc;

/// Events delivered by the signaling/connection service.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The service assigned this node its session identity.
    IdentityAssigned(PeerId),
    /// An inbound data-connection arrived and is negotiating.
    ConnectionRequested {
        /// The dialing peer
        remote: PeerId,
    },
    /// A data-connection (either direction) reached the open state.
    ConnectionOpened {
        /// The connected peer
        remote: PeerId,
    },
    /// A data-connection closed normally.
    ConnectionClosed {
        /// The departed peer
        remote: PeerId,
    },
    /// A data-connection failed.
    ConnectionFailed {
        /// The affected peer
        remote: PeerId,
        /// Transport-reported reason
        reason: String,
    },
    /// An inbound call arrived.
    CallOffered {
        /// The calling peer
        remote: PeerId,
    },
    /// A media stream became available on an answered call.
    CallStream {
        /// The calling peer
        remote: PeerId,
        /// The remote stream
        stream: Arc<MediaStream>,
    },
    /// A call (either direction) failed.
    CallFailed {
        /// The affected peer
        remote: PeerId,
        /// Transport-reported reason
        reason: String,
    },
    /// A service-level error not tied to one peer.
    ProviderError {
        /// Service-reported reason
        reason: String,
    },
}

impl TransportEvent {
    /// Short event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IdentityAssigned(_) => "identity_assigned",
            Self::ConnectionRequested { .. } => "connection_requested",
            Self::ConnectionOpened { .. } => "connection_opened",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::CallOffered { .. } => "call_offered",
            Self::CallStream { .. } => "call_stream",
            Self::CallFailed { .. } => "call_failed",
            Self::ProviderError { .. } => "provider_error",
        }
    }
}

/// Operator-facing commands.
#[derive(Debug, Clone)]
pub enum Command {
    /// Switch between broadcaster and listener. Force-stops an active
    /// broadcast first.
    SetRole(Role),
    /// Select the capture source for the next broadcast. Rejected while one
    /// is active.
    SetSource(SourceKind),
    /// Acquire a stream and fan it out to every joined peer.
    StartBroadcast,
    /// Stop the stream. Idempotent, safe mid-capture.
    StopBroadcast,
    /// Start when inactive, stop when active.
    ToggleBroadcast,
    /// Dial a remote identity (listener action).
    Connect {
        /// The identity to dial
        remote: PeerId,
    },
    /// Tear the node down; no further events are processed.
    Shutdown,
}

/// One message through the node's single handling entry point.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A transport callback
    Transport(TransportEvent),
    /// An operator action
    Command(Command),
    /// A capture request resolved, possibly after the broadcast was
    /// cancelled in the meantime.
    CaptureReady {
        /// The source that was requested
        source: SourceKind,
        /// The acquired stream or the capture failure
        result: Result<Arc<MediaStream>, CaptureError>,
    },
}

impl From<TransportEvent> for SessionEvent {
    fn from(event: TransportEvent) -> Self {
        Self::Transport(event)
    }
}

impl From<Command> for SessionEvent {
    fn from(cmd: Command) -> Self {
        Self::Command(cmd)
    }
}

/// Side effects the node asks the driver to perform.
///
/// Each may fail asynchronously; failures come back to the node as
/// [`TransportEvent::ConnectionFailed`] / [`TransportEvent::CallFailed`] and
/// are absorbed there.
#[derive(Debug, Clone)]
pub enum Action {
    /// Dial a remote identity's data-connection.
    OpenConnection {
        /// The identity to dial
        remote: PeerId,
    },
    /// Answer an inbound call with no outbound media.
    AnswerCall {
        /// The calling peer
        remote: PeerId,
    },
    /// Place an outbound call carrying the local stream.
    PlaceCall {
        /// The peer to call
        remote: PeerId,
        /// The stream to carry
        stream: Arc<MediaStream>,
    },
    /// Ask the capture collaborator for a stream.
    RequestCapture {
        /// The source to capture from
        source: SourceKind,
    },
    /// Route a remote stream to the playback/visualization sink.
    RoutePlayback {
        /// The peer the stream came from
        remote: PeerId,
        /// The remote stream
        stream: Arc<MediaStream>,
    },
}
