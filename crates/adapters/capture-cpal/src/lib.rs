//! Microphone and loopback capture via cpal.
//!
//! Implements [`CaptureSource`] over the host audio backend. cpal streams are
//! not `Send`, so each request spins up a dedicated capture thread that owns
//! the device stream and pushes PCM buffers into the media stream's audio
//! track; the thread exits once the pipeline stops the track.
//!
//! `DisplayAudio` capture relies on a loopback/monitor input device being
//! present (PulseAudio monitors, "Stereo Mix", BlackHole and the like); when
//! none is found the request fails as unavailable and the operator can fall
//! back to the microphone.

#![warn(missing_docs)]
#![warn(clippy::all)]

use aircast_core::capture::CaptureSource;
use aircast_core::media::{MediaStream, SourceKind};
use aircast_core::CaptureError;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Name fragments that identify a loopback/monitor input device.
const LOOPBACK_HINTS: &[&str] = &[
    "monitor",
    "loopback",
    "stereo mix",
    "blackhole",
    "soundflower",
];

/// Poll interval for the capture thread's end-of-track check.
const TRACK_POLL: Duration = Duration::from_millis(50);

/// Capture configuration.
#[derive(Debug, Clone)]
pub struct CpalCaptureConfig {
    /// Preferred sample rate in Hz; clamped to what the device supports
    pub sample_rate: u32,
    /// Number of input channels to request
    pub channels: u16,
    /// Microphone device name; the default input device when `None`
    pub device: Option<String>,
}

impl Default for CpalCaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            device: None,
        }
    }
}

/// A [`CaptureSource`] backed by the host audio backend.
pub struct CpalCapture {
    config: CpalCaptureConfig,
}

impl CpalCapture {
    /// A capture source with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CpalCaptureConfig::default())
    }

    /// A capture source with an explicit configuration.
    pub fn with_config(config: CpalCaptureConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CpalCaptureConfig {
        &self.config
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureSource for CpalCapture {
    async fn request_stream(&self, kind: SourceKind) -> Result<Arc<MediaStream>, CaptureError> {
        let config = self.config.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("aircast-capture".into())
            .spawn(move || run_capture(kind, config, ready_tx))
            .map_err(|e| CaptureError::Unavailable(format!("capture thread: {e}")))?;
        ready_rx
            .await
            .map_err(|_| CaptureError::Unavailable("capture thread exited before start".into()))?
    }
}

/// Capture thread body: owns the device stream for the track's lifetime.
fn run_capture(
    kind: SourceKind,
    config: CpalCaptureConfig,
    ready: oneshot::Sender<Result<Arc<MediaStream>, CaptureError>>,
) {
    match start_device_stream(kind, &config) {
        Ok((device_stream, media)) => {
            let track = match media.audio_track() {
                Some(track) => Arc::clone(track),
                None => {
                    let _ = ready.send(Err(CaptureError::Unavailable(
                        "capture produced no audio track".into(),
                    )));
                    return;
                }
            };
            if ready.send(Ok(Arc::clone(&media))).is_err() {
                // Requester is gone; end the capture immediately.
                media.stop_tracks();
                return;
            }
            while !track.is_ended() {
                std::thread::sleep(TRACK_POLL);
            }
            drop(device_stream);
            debug!("capture thread ended");
        }
        Err(err) => {
            let _ = ready.send(Err(err));
        }
    }
}

fn start_device_stream(
    kind: SourceKind,
    config: &CpalCaptureConfig,
) -> Result<(cpal::Stream, Arc<MediaStream>), CaptureError> {
    let device = select_device(kind, config)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device
        .supported_input_configs()
        .map_err(|e| map_backend_error(&e.to_string()))?
        .find(|c| c.channels() == config.channels)
        .ok_or_else(|| {
            CaptureError::Unavailable(format!(
                "device '{device_name}' does not support {} channel(s)",
                config.channels
            ))
        })?;
    let rate = config
        .sample_rate
        .clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
    let stream_config = supported.with_sample_rate(cpal::SampleRate(rate));

    info!(device = %device_name, rate, channels = config.channels, %kind, "starting capture");

    let media = Arc::new(MediaStream::new(kind, rate));
    let track = match media.audio_track() {
        Some(track) => Arc::clone(track),
        None => {
            return Err(CaptureError::Unavailable(
                "capture produced no audio track".into(),
            ))
        }
    };

    let device_stream = device
        .build_input_stream(
            &stream_config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                track.push_samples(data);
            },
            |err| {
                error!(%err, "capture stream error");
            },
            None,
        )
        .map_err(|e| map_backend_error(&e.to_string()))?;
    device_stream
        .play()
        .map_err(|e| map_backend_error(&e.to_string()))?;

    Ok((device_stream, media))
}

fn select_device(kind: SourceKind, config: &CpalCaptureConfig) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match kind {
        SourceKind::Microphone => match &config.device {
            Some(name) => find_input_device(&host, |n| n.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    CaptureError::Unavailable(format!("no input device named '{name}'"))
                }),
            None => host
                .default_input_device()
                .ok_or_else(|| CaptureError::Unavailable("no default input device".into())),
        },
        SourceKind::DisplayAudio => find_input_device(&host, is_loopback_name).ok_or_else(|| {
            CaptureError::Unavailable("no loopback/monitor capture device available".into())
        }),
    }
}

fn find_input_device(
    host: &cpal::Host,
    matches: impl Fn(&str) -> bool,
) -> Option<cpal::Device> {
    host.input_devices()
        .ok()?
        .find(|device| device.name().map(|name| matches(&name)).unwrap_or(false))
}

/// Whether a device name looks like a system-audio loopback input.
fn is_loopback_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    LOOPBACK_HINTS.iter().any(|hint| name.contains(hint))
}

/// Permission refusals surface as backend-specific error text; everything
/// else means the source cannot be used right now.
fn map_backend_error(message: &str) -> CaptureError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::Denied(message.to_string())
    } else {
        CaptureError::Unavailable(message.to_string())
    }
}
