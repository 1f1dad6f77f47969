//! Transcode module
//!
//! Converts finalized recordings into the configured target container
//! through a staged pipeline with an external conversion engine.

pub mod pipeline;
pub mod types;

pub use pipeline::TranscodePipeline;
pub use types::{
    ConversionEngine, TranscodeError, TranscodeFormat, TranscodeJob, TranscodeStage,
    TranscodeStatus,
};
