//! Capture collaborator boundary: turning a selected source into a stream.

pub mod synthetic;

pub use synthetic::SyntheticCapture;

use crate::error::CaptureError;
use crate::media::{MediaStream, SourceKind};
use async_trait::async_trait;
use std::sync::Arc;

/// A source of local media streams.
///
/// Implementations wrap the platform capture API. Acquisition is asynchronous
/// because it may sit behind a permission prompt; callers must assume
/// arbitrary events interleave before the result arrives.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Acquire a live stream from the selected source.
    ///
    /// Fails with [`CaptureError::Denied`] when the permission is refused and
    /// [`CaptureError::Unavailable`] when the source cannot provide audio.
    async fn request_stream(&self, kind: SourceKind) -> Result<Arc<MediaStream>, CaptureError>;
}
