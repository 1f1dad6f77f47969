//! Recording system module
//!
//! This module implements chunked video recording:
//! - RecordingSession accumulates ordered encoded chunks
//! - VideoRecorder drives the Idle/Recording/Finalizing lifecycle

pub mod state;
pub mod video;

pub use state::{RecorderPhase, RecordingSession};
pub use video::{RecorderError, VideoRecorder};
