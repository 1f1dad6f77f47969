//! Pawcam - live camera capture pipeline for pet emotion monitoring
//!
//! Owns the client-side capture loop: acquiring and releasing the
//! camera stream, polling a detector over live frames, firing a single
//! auto-capture when a detection crosses the configured threshold,
//! chunked video recording with byte-exact finalize, and staged
//! transcoding of finalized recordings.
//!
//! [`CaptureOrchestrator`] is the entry point; hosts plug in the camera
//! device, the detector, the artifact sink, and the conversion engine
//! through the traits in [`capture`].

pub mod artifact;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod orchestrator;
pub mod recorder;
pub mod still;
pub mod stream;
pub mod transcode;

pub use artifact::{ArtifactKind, CaptureArtifact, MediaType};
pub use capture::{ArtifactSink, Detector, DeviceCapture, Frame, MediaStream};
pub use config::{CaptureConfig, ConfigError};
pub use error::{CaptureError, CaptureResult, ErrorResponse};
pub use orchestrator::{CaptureEvent, CaptureOrchestrator};
pub use stream::{StreamManager, StreamStatus};
pub use transcode::{ConversionEngine, TranscodeFormat, TranscodeJob};
