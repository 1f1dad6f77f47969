//! Capture trait definitions
//!
//! Capability seams between the pipeline and its host: camera hardware,
//! the face detector, and the artifact upload transport all plug in here.

use crate::artifact::{CaptureArtifact, MediaType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// A single decoded video frame
///
/// Frames are ephemeral: the pipeline only ever reads the current one and
/// never queues them.
#[derive(Clone)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Tightly packed RGB24 pixel data (`width * height * 3` bytes)
    pub data: Vec<u8>,

    /// When the sensor produced this frame
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Expected buffer size for the frame's dimensions
    pub fn expected_byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data_bytes", &self.data.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Bounding box of a detected face region, in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Outcome of a single detector invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Confidence score (0.0 to 1.0)
    pub score: f32,

    /// Face bounding box, when the detector reports one
    pub region: Option<Region>,
}

/// Errors from the camera device layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device available")]
    NoDevice,
}

/// Errors from the detector capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// The detector is still loading or otherwise not ready; ticks that
    /// hit this are skipped, not surfaced.
    #[error("detector is not ready")]
    Unavailable,
}

/// A live hardware camera stream
///
/// Returned by [`DeviceCapture::open`]. After [`stop_tracks`] the handle
/// stays valid but inert: no more frames, and the chunk channel closes.
///
/// [`stop_tracks`]: MediaStream::stop_tracks
pub trait MediaStream: Send + Sync {
    /// Most recent decoded frame, or `None` before the first frame
    /// arrives or after the tracks have stopped
    fn current_frame(&self) -> Option<Frame>;

    /// Begin delivering encoded container chunks, flushed roughly every
    /// `flush_interval`
    fn encoded_chunks(&self, flush_interval: Duration) -> mpsc::Receiver<Vec<u8>>;

    /// Container format of the encoded chunks
    fn container(&self) -> MediaType;

    /// Stop all tracks and release the underlying device
    fn stop_tracks(&self);
}

/// Camera device acquisition
#[async_trait]
pub trait DeviceCapture: Send + Sync {
    /// Request a video-only stream from the hardware
    async fn open(&self) -> Result<Arc<dyn MediaStream>, DeviceError>;
}

/// Face detection over single frames
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Detection, DetectorError>;
}

/// Destination for finished capture artifacts
///
/// Owned by an upload transport outside this crate; failures are opaque
/// to the pipeline.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist or upload one artifact, optionally associated with an
    /// application record
    async fn submit(&self, artifact: &CaptureArtifact, record_id: Option<&str>)
        -> anyhow::Result<()>;
}
