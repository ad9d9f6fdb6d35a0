//! Media primitives: shared streams, broadcast fan-out, waveform sampling.

pub mod pipeline;
pub mod stream;
pub mod visualizer;

pub use pipeline::BroadcastPipeline;
pub use stream::{AudioTrack, MediaStream};
pub use visualizer::{SampleFrame, WaveformSampler, ANALYSIS_WINDOW, FRAME_LEN};

use crate::identity::PeerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Local audio source selected for a broadcast.
///
/// The two sources are mutually exclusive per capture request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Microphone input device
    #[default]
    Microphone,
    /// System/display audio (loopback)
    DisplayAudio,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Microphone => f.write_str("microphone"),
            SourceKind::DisplayAudio => f.write_str("display_audio"),
        }
    }
}

/// Direction of a media session relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    /// We placed the call, carrying our local stream
    Outbound,
    /// A remote placed the call; we answered with no outbound media
    Inbound,
}

/// One direction of an audio call tied to a remote identity.
///
/// Outbound sessions exist per registered peer only while a broadcast is
/// active. Inbound sessions are created when a call arrives and live
/// independently of the data-connection registry.
#[derive(Debug, Clone)]
pub struct MediaSession {
    remote: PeerId,
    direction: CallDirection,
    stream: Option<Arc<MediaStream>>,
}

impl MediaSession {
    /// An outbound session carrying the local stream to `remote`.
    pub(crate) fn outbound(remote: PeerId, stream: Arc<MediaStream>) -> Self {
        Self {
            remote,
            direction: CallDirection::Outbound,
            stream: Some(stream),
        }
    }

    /// An inbound session answered with no outbound media; the remote stream
    /// attaches when it becomes available.
    pub(crate) fn inbound(remote: PeerId) -> Self {
        Self {
            remote,
            direction: CallDirection::Inbound,
            stream: None,
        }
    }

    /// The remote identity this session is tied to.
    pub fn remote(&self) -> &PeerId {
        &self.remote
    }

    /// Call direction relative to this node.
    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    /// The attached stream, if one is available yet.
    pub fn stream(&self) -> Option<&Arc<MediaStream>> {
        self.stream.as_ref()
    }

    pub(crate) fn attach(&mut self, stream: Arc<MediaStream>) {
        self.stream = Some(stream);
    }
}
