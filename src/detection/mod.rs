//! Detection loop and auto-capture trigger
//!
//! The sampler polls the live stream on a fixed period and forwards
//! frames to the detector; the trigger decides when a score fires a
//! still capture.

pub mod sampler;
pub mod trigger;

pub use sampler::{DetectionLoop, DetectionResult};
pub use trigger::{AutoCaptureController, TriggerState};
