//! Transcode pipeline
//!
//! Stage-tagged conversion of a finalized recording into the target
//! container. Each stage checks a cancel flag before starting, and any
//! failure names the stage it happened in. The input artifact is never
//! modified; success produces a fresh artifact.

use super::types::{ConversionEngine, TranscodeError, TranscodeFormat, TranscodeStage};
use crate::artifact::{ArtifactKind, CaptureArtifact};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Runs one conversion job end to end
///
/// Build a fresh pipeline per job; the temp workspace and cancel flag
/// belong to a single run.
pub struct TranscodePipeline {
    engine: Arc<dyn ConversionEngine>,
    target: TranscodeFormat,
    cancel_flag: Arc<AtomicBool>,
}

impl TranscodePipeline {
    pub fn new(
        engine: Arc<dyn ConversionEngine>,
        target: TranscodeFormat,
        cancel_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            engine,
            target,
            cancel_flag,
        }
    }

    /// Convert the input artifact, returning a new artifact in the
    /// target container
    pub async fn run(&self, input: &CaptureArtifact) -> Result<CaptureArtifact, TranscodeError> {
        tracing::info!(
            input = %input.filename,
            target = ?self.target,
            "transcode started"
        );

        self.check_cancelled()?;

        // Stage: Load
        let workspace =
            TempDir::new().map_err(|e| TranscodeError::at(TranscodeStage::Load, e))?;
        let input_path = workspace
            .path()
            .join(format!("input.{}", input.media_type.extension()));
        let output_path = workspace
            .path()
            .join(format!("output.{}", self.target.extension()));
        tokio::fs::write(&input_path, &input.payload)
            .await
            .map_err(|e| TranscodeError::at(TranscodeStage::Load, e))?;

        self.check_cancelled()?;

        // Stage: Convert
        self.engine
            .convert(&input_path, &output_path, self.target)
            .await
            .map_err(|e| TranscodeError::at(TranscodeStage::Convert, e))?;

        self.check_cancelled()?;

        // Stage: Read
        let payload = tokio::fs::read(&output_path)
            .await
            .map_err(|e| TranscodeError::at(TranscodeStage::Read, e))?;
        if payload.is_empty() {
            return Err(TranscodeError::at(
                TranscodeStage::Read,
                "engine produced an empty output file",
            ));
        }

        self.check_cancelled()?;

        // Stage: Wrap
        let artifact = CaptureArtifact::new(
            ArtifactKind::Video,
            payload,
            &input.owner,
            self.target.media_type(),
            Utc::now(),
        );
        tracing::info!(
            output = %artifact.filename,
            bytes = artifact.payload.len(),
            "transcode complete"
        );
        Ok(artifact)
    }

    fn check_cancelled(&self) -> Result<(), TranscodeError> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            return Err(TranscodeError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MediaType;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    enum EngineMode {
        /// Write fixed bytes to the output path
        Succeed(Vec<u8>),
        /// Return an error without writing anything
        Fail,
        /// Claim success but write nothing
        NoOutput,
        /// Write an empty output file
        EmptyOutput,
    }

    struct StubEngine {
        mode: EngineMode,
        calls: AtomicUsize,
    }

    impl StubEngine {
        fn new(mode: EngineMode) -> Self {
            Self {
                mode,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ConversionEngine for StubEngine {
        async fn convert(
            &self,
            input: &Path,
            output: &Path,
            _target: TranscodeFormat,
        ) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(input.exists(), "input file must be staged before convert");
            match &self.mode {
                EngineMode::Succeed(bytes) => {
                    tokio::fs::write(output, bytes).await?;
                    Ok(())
                }
                EngineMode::Fail => anyhow::bail!("engine exited with code 1"),
                EngineMode::NoOutput => Ok(()),
                EngineMode::EmptyOutput => {
                    tokio::fs::write(output, b"").await?;
                    Ok(())
                }
            }
        }
    }

    fn webm_input() -> CaptureArtifact {
        CaptureArtifact::new(
            ArtifactKind::Video,
            vec![0x1A, 0x45, 0xDF, 0xA3],
            "dana@example.com",
            MediaType::Webm,
            Utc::now(),
        )
    }

    fn pipeline(engine: Arc<StubEngine>) -> TranscodePipeline {
        TranscodePipeline::new(engine, TranscodeFormat::Mp4, Arc::new(AtomicBool::new(false)))
    }

    #[tokio::test]
    async fn test_successful_conversion_wraps_new_artifact() {
        let engine = Arc::new(StubEngine::new(EngineMode::Succeed(vec![9, 9, 9])));
        let input = webm_input();
        let original_payload = input.payload.clone();

        let output = pipeline(engine.clone()).run(&input).await.unwrap();

        assert_eq!(output.payload, vec![9, 9, 9]);
        assert_eq!(output.media_type, MediaType::Mp4);
        assert!(output.filename.ends_with(".mp4"));
        assert_eq!(output.owner, input.owner);
        // The input artifact is untouched
        assert_eq!(input.payload, original_payload);
        assert_eq!(input.media_type, MediaType::Webm);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_engine_failure_is_tagged_convert() {
        let engine = Arc::new(StubEngine::new(EngineMode::Fail));
        let input = webm_input();

        let err = pipeline(engine).run(&input).await.unwrap_err();
        assert_eq!(err.stage(), Some(TranscodeStage::Convert));
        assert!(err.to_string().contains("engine exited with code 1"));
        assert_eq!(input.payload, vec![0x1A, 0x45, 0xDF, 0xA3]);
    }

    #[tokio::test]
    async fn test_missing_output_is_tagged_read() {
        let engine = Arc::new(StubEngine::new(EngineMode::NoOutput));
        let err = pipeline(engine).run(&webm_input()).await.unwrap_err();
        assert_eq!(err.stage(), Some(TranscodeStage::Read));
    }

    #[tokio::test]
    async fn test_empty_output_is_tagged_read() {
        let engine = Arc::new(StubEngine::new(EngineMode::EmptyOutput));
        let err = pipeline(engine).run(&webm_input()).await.unwrap_err();
        assert_eq!(err.stage(), Some(TranscodeStage::Read));
        assert!(err.to_string().contains("empty output"));
    }

    #[tokio::test]
    async fn test_preset_cancel_flag_skips_engine() {
        let engine = Arc::new(StubEngine::new(EngineMode::Succeed(vec![1])));
        let cancel = Arc::new(AtomicBool::new(true));
        let pipeline =
            TranscodePipeline::new(engine.clone(), TranscodeFormat::Mp4, cancel);

        let err = pipeline.run(&webm_input()).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Cancelled));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }
}
