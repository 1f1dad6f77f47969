//! Still image capture
//!
//! Encodes the current frame to a JPEG artifact and hands it to the
//! artifact sink.

use crate::artifact::{ArtifactKind, CaptureArtifact, MediaType};
use crate::capture::traits::{ArtifactSink, Frame};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::sync::Arc;
use thiserror::Error;

/// Errors from still capture
#[derive(Error, Debug)]
pub enum StillError {
    #[error("no frame available from the stream")]
    FrameUnavailable,

    #[error("jpeg encoding failed: {0}")]
    Encode(String),

    #[error("artifact submission failed: {0}")]
    Submit(anyhow::Error),
}

/// Renders frames into JPEG artifacts and submits them
pub struct StillCapture {
    sink: Arc<dyn ArtifactSink>,
    quality: u8,
}

impl StillCapture {
    pub fn new(sink: Arc<dyn ArtifactSink>, quality: u8) -> Self {
        Self { sink, quality }
    }

    /// Encode a frame to a JPEG artifact without submitting it
    ///
    /// The artifact timestamp (and so its filename) comes from the
    /// frame's capture time.
    pub fn encode(&self, frame: &Frame, owner: &str) -> Result<CaptureArtifact, StillError> {
        if frame.data.is_empty() {
            return Err(StillError::FrameUnavailable);
        }
        if frame.data.len() != frame.expected_byte_len() {
            return Err(StillError::Encode(format!(
                "frame buffer is {} bytes, expected {} for {}x{} rgb",
                frame.data.len(),
                frame.expected_byte_len(),
                frame.width,
                frame.height
            )));
        }

        let mut payload = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut payload, self.quality);
        encoder
            .encode(
                &frame.data,
                frame.width,
                frame.height,
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| StillError::Encode(e.to_string()))?;

        Ok(CaptureArtifact::new(
            ArtifactKind::Image,
            payload,
            owner,
            MediaType::Jpeg,
            frame.captured_at,
        ))
    }

    /// Encode and submit in one step
    pub async fn capture(
        &self,
        frame: &Frame,
        owner: &str,
        record_id: Option<&str>,
    ) -> Result<CaptureArtifact, StillError> {
        let artifact = self.encode(frame, owner)?;
        self.sink
            .submit(&artifact, record_id)
            .await
            .map_err(StillError::Submit)?;
        tracing::info!(
            filename = %artifact.filename,
            bytes = artifact.payload.len(),
            "still captured"
        );
        Ok(artifact)
    }
}
