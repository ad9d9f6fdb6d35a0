//! Pull-based waveform sampling of a live stream.
//!
//! The sink calls [`WaveformSampler::next_frame`] once per display frame and
//! draws whatever it gets; it holds no reference into the pipeline beyond a
//! shared track handle, and sampling has no effect on fan-out.

use super::{AudioTrack, MediaStream};
use std::sync::Arc;

/// Point count of the time-domain analysis window.
pub const ANALYSIS_WINDOW: usize = 2048;

/// Samples per frame: half the analysis window.
pub const FRAME_LEN: usize = ANALYSIS_WINDOW / 2;

/// Unsigned-byte value representing silence (a centered waveform).
const CENTER: u8 = 128;

/// One frame of time-domain byte samples, centered on 128.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFrame {
    samples: Vec<u8>,
}

impl SampleFrame {
    /// The byte samples, always [`FRAME_LEN`] of them.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Peak deviation from center in this frame; 0 for silence.
    pub fn peak(&self) -> u8 {
        self.samples
            .iter()
            .map(|&s| s.abs_diff(CENTER))
            .max()
            .unwrap_or(0)
    }
}

/// Lazily pulls fixed-size time-domain frames from a live stream.
///
/// The sequence is infinite while the stream is live and non-restartable:
/// once the underlying track ends, [`next_frame`](Self::next_frame) returns
/// `None` forever, with no error. Sampling is read-only against the track.
#[derive(Debug)]
pub struct WaveformSampler {
    track: Arc<AudioTrack>,
    finished: bool,
}

impl WaveformSampler {
    /// Attach to a stream's primary audio track. Returns `None` when the
    /// stream carries no audio.
    pub fn new(stream: &MediaStream) -> Option<Self> {
        let track = stream.audio_track()?;
        Some(Self {
            track: Arc::clone(track),
            finished: false,
        })
    }

    /// The next frame of byte samples, or `None` once the stream has stopped.
    pub fn next_frame(&mut self) -> Option<SampleFrame> {
        if self.finished {
            return None;
        }
        if self.track.is_ended() {
            self.finished = true;
            return None;
        }
        let recent = self.track.recent_samples(FRAME_LEN);
        // Pad the head with silence until a full window has been captured.
        let mut samples = vec![CENTER; FRAME_LEN - recent.len()];
        samples.extend(recent.iter().map(|&s| to_byte(s)));
        Some(SampleFrame { samples })
    }
}

impl Iterator for WaveformSampler {
    type Item = SampleFrame;

    fn next(&mut self) -> Option<SampleFrame> {
        self.next_frame()
    }
}

/// Map an f32 sample in [-1.0, 1.0] to an unsigned byte centered on 128.
fn to_byte(sample: f32) -> u8 {
    ((sample.clamp(-1.0, 1.0) + 1.0) * 127.5).round() as u8
}
