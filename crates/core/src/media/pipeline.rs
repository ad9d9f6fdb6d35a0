//! Broadcast pipeline: local stream acquisition and per-peer fan-out.
//!
//! Fan-out is a standing invariant, not a snapshot: while a broadcast is
//! active, every registered peer has exactly one outbound media session
//! carrying the current local stream, including peers that join later.

use super::{MediaSession, MediaStream, SourceKind};
use crate::error::CaptureError;
use crate::identity::PeerId;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Broadcast state and outbound-session bookkeeping for one node.
///
/// Mutated only by the session node in response to explicit start/stop
/// actions and registry changes; capture acquisition is asynchronous, so the
/// pipeline re-checks its own state when the request resolves.
#[derive(Debug)]
pub struct BroadcastPipeline {
    source: SourceKind,
    active: bool,
    local_stream: Option<Arc<MediaStream>>,
    /// Set between a capture request going out and its resolution.
    pending: Option<SourceKind>,
    /// Outbound media sessions keyed by remote identity.
    outbound: IndexMap<PeerId, MediaSession>,
}

impl Default for BroadcastPipeline {
    fn default() -> Self {
        Self::new(SourceKind::default())
    }
}

impl BroadcastPipeline {
    /// A new, inactive pipeline preferring the given source.
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            active: false,
            local_stream: None,
            pending: None,
            outbound: IndexMap::new(),
        }
    }

    /// The currently preferred capture source.
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Whether a broadcast is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a capture request is in flight.
    pub fn is_capture_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The live local stream while active.
    pub fn local_stream(&self) -> Option<&Arc<MediaStream>> {
        self.local_stream.as_ref()
    }

    /// Outbound sessions in fan-out order.
    pub fn outbound_sessions(&self) -> impl Iterator<Item = &MediaSession> {
        self.outbound.values()
    }

    /// The outbound session to one peer, if any.
    pub fn outbound_to(&self, remote: &PeerId) -> Option<&MediaSession> {
        self.outbound.get(remote)
    }

    /// Change the preferred source. Rejected while a broadcast is active or a
    /// capture request is in flight; the operator must stop first.
    pub fn set_source(&mut self, source: SourceKind) -> bool {
        if self.active || self.pending.is_some() {
            warn!(requested = %source, "source change rejected while broadcasting");
            return false;
        }
        if self.source != source {
            debug!(%source, "audio source selected");
            self.source = source;
        }
        true
    }

    /// Begin acquiring a stream from the preferred source. Returns the source
    /// to request, or `None` when a broadcast is already active or a request
    /// is already in flight.
    pub(crate) fn begin_capture(&mut self) -> Option<SourceKind> {
        if self.active {
            warn!("broadcast already active");
            return None;
        }
        if self.pending.is_some() {
            warn!("capture request already in flight");
            return None;
        }
        self.pending = Some(self.source);
        Some(self.source)
    }

    /// Resolve a capture request.
    ///
    /// The request may have been cancelled while the permission prompt was
    /// pending (stop, shutdown, role change); in that case the arrived stream
    /// is stopped immediately rather than attached. On success the broadcast
    /// activates and an outbound session is opened for every peer in `peers`;
    /// the stream to carry is returned so the caller can place the calls.
    pub(crate) fn on_capture_ready(
        &mut self,
        source: SourceKind,
        result: Result<Arc<MediaStream>, CaptureError>,
        peers: &[PeerId],
    ) -> Option<Arc<MediaStream>> {
        if self.pending != Some(source) {
            if let Ok(stream) = result {
                stream.stop_tracks();
            }
            debug!(%source, "capture resolved after cancellation; stream discarded");
            return None;
        }
        self.pending = None;

        let stream = match result {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%source, %err, "broadcast not started");
                return None;
            }
        };
        if stream.audio_track().is_none() {
            stream.stop_tracks();
            let err = CaptureError::Unavailable("acquired stream has no audio track".into());
            warn!(%source, %err, "broadcast not started");
            return None;
        }

        self.active = true;
        self.local_stream = Some(Arc::clone(&stream));
        for peer in peers {
            self.outbound.insert(
                peer.clone(),
                MediaSession::outbound(peer.clone(), Arc::clone(&stream)),
            );
        }
        info!(%source, peers = peers.len(), "broadcast started");
        Some(stream)
    }

    /// Open an outbound session to a peer that joined while active.
    /// Returns the stream to carry, or `None` when inactive or the peer
    /// already has a session.
    pub(crate) fn fan_out_to(&mut self, remote: &PeerId) -> Option<Arc<MediaStream>> {
        if !self.active {
            return None;
        }
        let stream = self.local_stream.as_ref()?;
        if self.outbound.contains_key(remote) {
            return None;
        }
        self.outbound.insert(
            remote.clone(),
            MediaSession::outbound(remote.clone(), Arc::clone(stream)),
        );
        debug!(peer = %remote, "late join: carrying stream to new peer");
        Some(Arc::clone(stream))
    }

    /// Drop the outbound session to a departed peer. Idempotent.
    pub(crate) fn drop_session(&mut self, remote: &PeerId) {
        self.outbound.shift_remove(remote);
    }

    /// Stop broadcasting.
    ///
    /// Safe to call at any time: with zero peers, repeatedly, or while a
    /// capture request is still pending; the eventual stream is then stopped
    /// on arrival instead of attached. Stopping the tracks is what ends the
    /// outbound calls; remote peers observe the stream end on their side.
    pub fn stop(&mut self) {
        self.pending = None;
        if let Some(stream) = self.local_stream.take() {
            stream.stop_tracks();
        }
        if self.active {
            info!("broadcast stopped");
        }
        self.active = false;
        self.outbound.clear();
    }
}
