//! Shared media stream and audio track primitives.
//!
//! A stream is acquired by exactly one owner (the broadcast pipeline for the
//! local stream, the answering side for a remote one). Media sessions and the
//! waveform sampler hold non-owning `Arc` handles; only the owner stops the
//! tracks.

use super::SourceKind;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Rolling sample window retained per track. Large enough for a full
/// analysis window plus capture jitter.
const TRACK_BUFFER_SAMPLES: usize = 8192;

/// A live audio track.
///
/// The capture side pushes f32 PCM buffers in; readers pull the most recent
/// window out. Stopping is one-way: once ended, further pushes are dropped
/// and readers observe the end on their next pull.
pub struct AudioTrack {
    label: String,
    sample_rate: u32,
    ended: AtomicBool,
    samples: Mutex<VecDeque<f32>>,
}

impl AudioTrack {
    pub(crate) fn new(label: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            label: label.into(),
            sample_rate,
            ended: AtomicBool::new(false),
            samples: Mutex::new(VecDeque::with_capacity(TRACK_BUFFER_SAMPLES)),
        }
    }

    /// Track label, e.g. `"audio0"`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sample rate of the pushed PCM data in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Append captured samples, retaining only the most recent window.
    /// Samples pushed after the track ended are dropped.
    pub fn push_samples(&self, samples: &[f32]) {
        if self.is_ended() {
            return;
        }
        let mut buf = self.samples.lock();
        buf.extend(samples.iter().copied());
        let excess = buf.len().saturating_sub(TRACK_BUFFER_SAMPLES);
        if excess > 0 {
            buf.drain(..excess);
        }
    }

    /// Copy out up to `len` of the most recent samples, oldest first.
    /// Returns fewer while the track has not yet buffered a full window.
    pub fn recent_samples(&self, len: usize) -> Vec<f32> {
        let buf = self.samples.lock();
        let start = buf.len().saturating_sub(len);
        buf.iter().skip(start).copied().collect()
    }

    /// Number of currently buffered samples.
    pub fn buffered(&self) -> usize {
        self.samples.lock().len()
    }

    /// End the track. Idempotent; buffered samples are released.
    pub fn stop(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.samples.lock().clear();
        }
    }

    /// Whether the track has ended.
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioTrack")
            .field("label", &self.label)
            .field("sample_rate", &self.sample_rate)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// A media stream: a bundle of shared audio tracks from one source.
pub struct MediaStream {
    id: String,
    source: SourceKind,
    audio: Vec<Arc<AudioTrack>>,
}

impl MediaStream {
    /// A stream with a single audio track at the given sample rate.
    pub fn new(source: SourceKind, sample_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            audio: vec![Arc::new(AudioTrack::new("audio0", sample_rate))],
        }
    }

    /// A stream that carries no audio track (e.g. a display capture that
    /// yielded video only). Broadcast activation rejects such streams.
    pub fn without_audio(source: SourceKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            audio: Vec::new(),
        }
    }

    /// Unique stream id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The source this stream was captured from.
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// The primary audio track, if the stream carries one.
    pub fn audio_track(&self) -> Option<&Arc<AudioTrack>> {
        self.audio.first()
    }

    /// All audio tracks.
    pub fn audio_tracks(&self) -> &[Arc<AudioTrack>] {
        &self.audio
    }

    /// Stop every track. Idempotent.
    pub fn stop_tracks(&self) {
        for track in &self.audio {
            track.stop();
        }
    }

    /// Whether any track is still live.
    pub fn is_live(&self) -> bool {
        self.audio.iter().any(|t| !t.is_ended())
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("tracks", &self.audio.len())
            .field("live", &self.is_live())
            .finish()
    }
}
