//! Pipeline configuration
//!
//! Host-facing configuration surface with validation.

use crate::transcode::TranscodeFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration for the capture pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Detection score at or above which auto-capture fires (0.0 to 1.0)
    pub auto_capture_threshold: f32,

    /// Detection sampling period in milliseconds
    pub detection_interval_ms: u64,

    /// Recording chunk flush period in milliseconds
    pub chunk_flush_interval_ms: u64,

    /// Target container for post-recording conversion
    pub target_transcode_format: TranscodeFormat,

    /// JPEG quality for still captures (1 to 100)
    pub still_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            auto_capture_threshold: 0.99,
            detection_interval_ms: 100,
            chunk_flush_interval_ms: 1000,
            target_transcode_format: TranscodeFormat::Mp4,
            still_quality: 95,
        }
    }
}

impl CaptureConfig {
    /// Validate all fields, returning the first violation found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.auto_capture_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(
                self.auto_capture_threshold,
            ));
        }
        if self.detection_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("detectionIntervalMs"));
        }
        if self.chunk_flush_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("chunkFlushIntervalMs"));
        }
        if !(1..=100).contains(&self.still_quality) {
            return Err(ConfigError::QualityOutOfRange(self.still_quality));
        }
        Ok(())
    }

    /// Detection sampling period as a `Duration`
    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    /// Chunk flush period as a `Duration`
    pub fn chunk_flush_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_flush_interval_ms)
    }
}

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("autoCaptureThreshold must be between 0.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f32),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("stillQuality must be between 1 and 100, got {0}")]
    QualityOutOfRange(u8),
}
