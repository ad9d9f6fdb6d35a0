//! Error types for aircast-core

use crate::identity::PeerId;
use thiserror::Error;

/// Result type alias for aircast-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for aircast-core
#[derive(Debug, Error)]
pub enum Error {
    /// Identity provider failure. Fatal to the node: without an identity it
    /// cannot accept or initiate connections.
    #[error("identity provider error: {0}")]
    Identity(String),

    /// Data-connection failure. Recoverable: affects a single peer
    /// connection, which is removed from the registry.
    #[error("connection with {peer} failed: {reason}")]
    Connection {
        /// Remote identity of the failed connection
        peer: PeerId,
        /// Transport-reported failure reason
        reason: String,
    },

    /// Call failure. Recoverable: affects a single media session.
    #[error("call with {peer} failed: {reason}")]
    Call {
        /// Remote identity of the failed call
        peer: PeerId,
        /// Transport-reported failure reason
        reason: String,
    },

    /// Stream acquisition failure.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The remote identity is not reachable through the transport.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// The session driver's command or event channel closed.
    #[error("session channel closed")]
    ChannelClosed,
}

/// Stream acquisition errors reported by a capture source.
///
/// Both variants are recoverable: the broadcast simply does not start and the
/// operator may retry, possibly with a different source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The operator or platform refused the capture permission.
    #[error("capture denied: {0}")]
    Denied(String),

    /// The selected source cannot provide an audio track.
    #[error("capture unavailable: {0}")]
    Unavailable(String),
}
