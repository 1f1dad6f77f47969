//! Error types and handling
//!
//! Pipeline-wide error type and the response shape handed to the
//! frontend.

use crate::config::ConfigError;
use crate::recorder::RecorderError;
use crate::still::StillError;
use crate::stream::StreamError;
use crate::transcode::TranscodeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Still(#[from] StillError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no active camera stream")]
    NoActiveStream,

    #[error("cannot start recording while auto-capture is armed")]
    AutoCaptureArmed,

    #[error("cannot arm auto-capture while a recording is in progress")]
    RecordingActive,

    #[error("no finalized recording available")]
    NoRecording,

    #[error("artifact submission failed: {0}")]
    Submit(anyhow::Error),
}

/// Error response for frontend
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<CaptureError> for ErrorResponse {
    fn from(error: CaptureError) -> Self {
        let code = match &error {
            CaptureError::Stream(StreamError::DeviceUnavailable(_)) => "DEVICE_UNAVAILABLE",
            CaptureError::Recorder(RecorderError::AlreadyRecording) => "ALREADY_RECORDING",
            CaptureError::Recorder(RecorderError::NotRecording) => "NOT_RECORDING",
            CaptureError::Recorder(RecorderError::EmptyRecording) => "EMPTY_RECORDING",
            CaptureError::Still(StillError::FrameUnavailable) => "FRAME_UNAVAILABLE",
            CaptureError::Still(StillError::Encode(_)) => "STILL_ENCODE_ERROR",
            CaptureError::Still(StillError::Submit(_)) => "SINK_ERROR",
            CaptureError::Transcode(TranscodeError::Cancelled) => "TRANSCODE_CANCELLED",
            CaptureError::Transcode(TranscodeError::Stage { .. }) => "TRANSCODE_STAGE_FAILURE",
            CaptureError::Config(_) => "INVALID_CONFIG",
            CaptureError::NoActiveStream => "NO_ACTIVE_STREAM",
            CaptureError::AutoCaptureArmed => "AUTO_CAPTURE_ARMED",
            CaptureError::RecordingActive => "RECORDING_ACTIVE",
            CaptureError::NoRecording => "NO_RECORDING",
            CaptureError::Submit(_) => "SINK_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;
