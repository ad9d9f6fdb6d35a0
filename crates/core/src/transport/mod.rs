//! Transport collaborator boundary.
//!
//! The signaling/connection service is a black box behind [`PeerTransport`]:
//! the core issues actions against it and consumes
//! [`TransportEvent`](crate::session::TransportEvent)s from the receiver the
//! transport hands out at registration. The core never blocks waiting on the
//! service; identity assignment and every connection outcome arrive as
//! events.

pub mod memory;

pub use memory::{MemoryHub, MemoryTransport};

use crate::error::Result;
use crate::identity::PeerId;
use crate::media::MediaStream;
use async_trait::async_trait;
use std::sync::Arc;

/// Actions the core issues against the signaling/connection service.
///
/// Each method may also fail later, asynchronously; such failures are
/// delivered as `ConnectionFailed` / `CallFailed` events rather than through
/// the returned `Result`.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Dial a remote identity's data-connection. The open (or failure) is
    /// reported through transport events on both ends.
    async fn open_connection(&self, remote: &PeerId) -> Result<()>;

    /// Place a call to `remote` carrying `stream`.
    async fn place_call(&self, remote: &PeerId, stream: Arc<MediaStream>) -> Result<()>;

    /// Answer the pending call from `remote` with no outbound media. The
    /// caller's stream arrives later as a `CallStream` event.
    async fn answer_call(&self, remote: &PeerId) -> Result<()>;

    /// Release the identity and stop delivering events. Peers observe the
    /// departure through their own connection lifecycle.
    async fn close(&self) -> Result<()>;
}
