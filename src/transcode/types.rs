//! Transcode types
//!
//! Job records, stage tags, and errors for the video conversion
//! pipeline.

use crate::artifact::MediaType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Target container format for a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeFormat {
    Mp4,
    Webm,
}

impl TranscodeFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TranscodeFormat::Mp4 => "mp4",
            TranscodeFormat::Webm => "webm",
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            TranscodeFormat::Mp4 => MediaType::Mp4,
            TranscodeFormat::Webm => MediaType::Webm,
        }
    }
}

/// Pipeline stage, recorded on the job when a conversion fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeStage {
    /// Writing the input artifact into the job workspace
    Load,
    /// Running the conversion engine
    Convert,
    /// Reading the converted payload back
    Read,
    /// Wrapping the payload as a new artifact
    Wrap,
}

impl fmt::Display for TranscodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TranscodeStage::Load => "load",
            TranscodeStage::Convert => "convert",
            TranscodeStage::Read => "read",
            TranscodeStage::Wrap => "wrap",
        };
        write!(f, "{}", name)
    }
}

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One conversion job, tracked from submission to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJob {
    pub id: Uuid,

    pub input_filename: String,

    pub output_filename: Option<String>,

    pub target: TranscodeFormat,

    pub status: TranscodeStatus,

    /// Stage the job failed at, when status is Failed
    pub failing_stage: Option<TranscodeStage>,

    pub error_detail: Option<String>,

    /// Stream epoch the job was submitted under
    pub epoch: u64,

    pub created_at: DateTime<Utc>,
}

impl TranscodeJob {
    pub fn pending(input_filename: impl Into<String>, target: TranscodeFormat, epoch: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_filename: input_filename.into(),
            output_filename: None,
            target,
            status: TranscodeStatus::Pending,
            failing_stage: None,
            error_detail: None,
            epoch,
            created_at: Utc::now(),
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TranscodeStatus::Running;
    }

    pub fn mark_succeeded(&mut self, output_filename: impl Into<String>) {
        self.status = TranscodeStatus::Succeeded;
        self.output_filename = Some(output_filename.into());
    }

    pub fn mark_failed(&mut self, error: &TranscodeError) {
        self.status = TranscodeStatus::Failed;
        self.failing_stage = error.stage();
        self.error_detail = Some(error.to_string());
    }
}

/// Errors from the transcode pipeline
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("transcode failed at {stage} stage: {detail}")]
    Stage {
        stage: TranscodeStage,
        detail: String,
    },

    #[error("transcode cancelled")]
    Cancelled,
}

impl TranscodeError {
    pub(crate) fn at(stage: TranscodeStage, err: impl fmt::Display) -> Self {
        TranscodeError::Stage {
            stage,
            detail: err.to_string(),
        }
    }

    /// Stage the pipeline failed at, if this is a stage failure
    pub fn stage(&self) -> Option<TranscodeStage> {
        match self {
            TranscodeError::Stage { stage, .. } => Some(*stage),
            TranscodeError::Cancelled => None,
        }
    }
}

/// External conversion capability
///
/// Implementations shell out to whatever converter the host provides;
/// failures come back as opaque errors and are tagged with the Convert
/// stage by the pipeline.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: TranscodeFormat,
    ) -> anyhow::Result<()>;
}
