//! Capture capability seams
//!
//! This module defines the integration points hosts implement: camera
//! hardware, face detection, and the artifact upload transport.

pub mod traits;

// Re-export traits
pub use traits::{
    ArtifactSink, Detection, Detector, DetectorError, DeviceCapture, DeviceError, Frame,
    MediaStream, Region,
};
