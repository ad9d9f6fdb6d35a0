//! Deterministic capture sources for tests and examples.

use super::CaptureSource;
use crate::error::CaptureError;
use crate::media::{MediaStream, SourceKind, ANALYSIS_WINDOW};
use async_trait::async_trait;
use std::f32::consts::PI;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Behavior {
    Tone { frequency: f32, amplitude: f32 },
    Silence,
    Denied(String),
    Unavailable(String),
    WithoutAudio,
}

/// A scripted capture source producing synthetic audio.
///
/// Tone and silence variants pre-fill one analysis window of samples so
/// samplers have data immediately; failure variants exercise the
/// capture-denied and no-audio paths without touching any platform API.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    sample_rate: u32,
    behavior: Behavior,
}

impl SyntheticCapture {
    /// A sine tone at the given frequency, amplitude 0.5.
    pub fn tone(frequency: f32) -> Self {
        Self {
            sample_rate: 48_000,
            behavior: Behavior::Tone {
                frequency,
                amplitude: 0.5,
            },
        }
    }

    /// All-zero samples.
    pub fn silence() -> Self {
        Self {
            sample_rate: 48_000,
            behavior: Behavior::Silence,
        }
    }

    /// Every request fails as if the permission was refused.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            sample_rate: 48_000,
            behavior: Behavior::Denied(reason.into()),
        }
    }

    /// Every request fails as if the source does not exist.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            sample_rate: 48_000,
            behavior: Behavior::Unavailable(reason.into()),
        }
    }

    /// Yields a stream with no audio track (a display capture that produced
    /// video only).
    pub fn without_audio() -> Self {
        Self {
            sample_rate: 48_000,
            behavior: Behavior::WithoutAudio,
        }
    }

    /// Override the sample rate of produced streams.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    fn filled_stream(&self, kind: SourceKind, samples: Vec<f32>) -> Arc<MediaStream> {
        let stream = Arc::new(MediaStream::new(kind, self.sample_rate));
        if let Some(track) = stream.audio_track() {
            track.push_samples(&samples);
        }
        stream
    }
}

#[async_trait]
impl CaptureSource for SyntheticCapture {
    async fn request_stream(&self, kind: SourceKind) -> Result<Arc<MediaStream>, CaptureError> {
        match &self.behavior {
            Behavior::Denied(reason) => Err(CaptureError::Denied(reason.clone())),
            Behavior::Unavailable(reason) => Err(CaptureError::Unavailable(reason.clone())),
            Behavior::WithoutAudio => Ok(Arc::new(MediaStream::without_audio(kind))),
            Behavior::Silence => Ok(self.filled_stream(kind, vec![0.0; ANALYSIS_WINDOW])),
            Behavior::Tone {
                frequency,
                amplitude,
            } => {
                let step = 2.0 * PI * frequency / self.sample_rate as f32;
                let samples = (0..ANALYSIS_WINDOW)
                    .map(|i| (step * i as f32).sin() * amplitude)
                    .collect();
                Ok(self.filled_stream(kind, samples))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::WaveformSampler;

    #[tokio::test]
    async fn test_tone_stream_has_samples() {
        let capture = SyntheticCapture::tone(440.0);
        let stream = capture
            .request_stream(SourceKind::Microphone)
            .await
            .unwrap();

        let mut sampler = WaveformSampler::new(&stream).unwrap();
        let frame = sampler.next_frame().unwrap();
        assert!(frame.peak() > 0);
    }

    #[tokio::test]
    async fn test_denied_and_unavailable() {
        let denied = SyntheticCapture::denied("no permission");
        assert!(matches!(
            denied.request_stream(SourceKind::Microphone).await,
            Err(CaptureError::Denied(_))
        ));

        let unavailable = SyntheticCapture::unavailable("no such device");
        assert!(matches!(
            unavailable.request_stream(SourceKind::DisplayAudio).await,
            Err(CaptureError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_without_audio_yields_trackless_stream() {
        let capture = SyntheticCapture::without_audio();
        let stream = capture
            .request_stream(SourceKind::DisplayAudio)
            .await
            .unwrap();
        assert!(stream.audio_track().is_none());
    }
}
