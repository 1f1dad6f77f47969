//! Capture orchestrator
//!
//! Owns the live session: the camera stream, the detection/auto-capture
//! cycle, the video recorder, and transcode jobs. Enforces that a
//! recording and an armed auto-capture cycle never coexist, and that
//! results from a previous stream generation never act on the current
//! one.

use crate::artifact::CaptureArtifact;
use crate::capture::traits::{ArtifactSink, Detector, DeviceCapture};
use crate::config::CaptureConfig;
use crate::detection::{AutoCaptureController, DetectionLoop, DetectionResult, TriggerState};
use crate::error::{CaptureError, CaptureResult};
use crate::recorder::{RecorderPhase, VideoRecorder};
use crate::still::{StillCapture, StillError};
use crate::stream::{StreamManager, StreamStatus};
use crate::transcode::{
    ConversionEngine, TranscodeFormat, TranscodeJob, TranscodePipeline, TranscodeStage,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Events emitted during a capture session
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Stream acquired a new generation
    StreamStarted { epoch: u64 },
    /// Stream released
    StreamStopped,
    /// Auto-capture cycle armed against a stream generation
    AutoCaptureArmed { epoch: u64 },
    /// Auto-capture disabled
    AutoCaptureDisarmed,
    /// A still was captured, manually or by the trigger
    StillCaptured { filename: String, auto: bool },
    /// Recording started
    RecordingStarted,
    /// Recording sealed into an artifact
    RecordingFinalized { filename: String, bytes: usize },
    /// Transcode job submitted
    TranscodeStarted { job: Uuid },
    /// Transcode job produced a converted artifact
    TranscodeSucceeded { job: Uuid, filename: String },
    /// Transcode job failed, with the stage when one is known
    TranscodeFailed {
        job: Uuid,
        stage: Option<TranscodeStage>,
    },
    /// Error occurred
    Error(String),
}

/// One armed detection cycle: the sampling loop plus the consumer that
/// acts on its results
struct AutoCaptureTask {
    epoch: u64,
    sampler: DetectionLoop,
    consumer: JoinHandle<()>,
}

struct Inner {
    config: CaptureConfig,
    owner: String,
    streams: StreamManager,
    detector: Arc<dyn Detector>,
    sink: Arc<dyn ArtifactSink>,
    engine: Arc<dyn ConversionEngine>,
    still: StillCapture,
    recorder: Mutex<VideoRecorder>,
    trigger: Mutex<AutoCaptureController>,
    /// Whether auto-capture should re-arm on the next stream start.
    /// Survives fires and stream stops; cleared only by an explicit
    /// disarm.
    auto_enabled: AtomicBool,
    auto_task: Mutex<Option<AutoCaptureTask>>,
    record_id: RwLock<Option<String>>,
    last_recording: RwLock<Option<CaptureArtifact>>,
    jobs: RwLock<HashMap<Uuid, TranscodeJob>>,
    events: broadcast::Sender<CaptureEvent>,
}

impl Inner {
    fn emit(&self, event: CaptureEvent) {
        let _ = self.events.send(event);
    }

    /// Arm the trigger and spawn the detection loop plus its consumer
    /// against the current stream generation
    fn spawn_auto_cycle(self: &Arc<Self>, epoch: u64) {
        let Some(stream) = self.streams.current() else {
            return;
        };

        // Clear out a finished or stale cycle before starting a new one
        if let Some(stale) = self.auto_task.lock().take() {
            stale.consumer.abort();
        }

        self.trigger.lock().arm();

        let (tx, rx) = mpsc::channel(16);
        let sampler = DetectionLoop::spawn(
            self.detector.clone(),
            stream,
            epoch,
            self.config.detection_interval(),
            self.streams.subscribe(),
            tx,
        );
        let loop_shutdown = sampler.shutdown_handle();
        let consumer = tokio::spawn(consume_detections(
            Arc::downgrade(self),
            rx,
            loop_shutdown,
        ));
        *self.auto_task.lock() = Some(AutoCaptureTask {
            epoch,
            sampler,
            consumer,
        });
        self.emit(CaptureEvent::AutoCaptureArmed { epoch });
        tracing::info!(epoch, "auto-capture cycle armed");
    }

    /// Disarm the trigger and stop the detection cycle, waiting for the
    /// sampling loop to wind down
    async fn teardown_auto_cycle(&self) {
        self.trigger.lock().disarm();
        let task = self.auto_task.lock().take();
        if let Some(task) = task {
            task.sampler.stop().await;
            task.consumer.abort();
            tracing::debug!(epoch = task.epoch, "auto-capture cycle stopped");
        }
    }
}

/// Frontend-facing entry point for the whole capture pipeline
pub struct CaptureOrchestrator {
    inner: Arc<Inner>,
}

impl CaptureOrchestrator {
    pub fn new(
        config: CaptureConfig,
        owner: impl Into<String>,
        device: Arc<dyn DeviceCapture>,
        detector: Arc<dyn Detector>,
        sink: Arc<dyn ArtifactSink>,
        engine: Arc<dyn ConversionEngine>,
    ) -> CaptureResult<Self> {
        config.validate()?;
        let owner = owner.into();
        let (events, _) = broadcast::channel(64);
        let inner = Arc::new(Inner {
            still: StillCapture::new(sink.clone(), config.still_quality),
            recorder: Mutex::new(VideoRecorder::new(
                owner.clone(),
                config.chunk_flush_interval(),
            )),
            trigger: Mutex::new(AutoCaptureController::new(config.auto_capture_threshold)),
            streams: StreamManager::new(device),
            detector,
            sink,
            engine,
            auto_enabled: AtomicBool::new(false),
            auto_task: Mutex::new(None),
            record_id: RwLock::new(None),
            last_recording: RwLock::new(None),
            jobs: RwLock::new(HashMap::new()),
            events,
            owner,
            config,
        });
        Ok(Self { inner })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.inner.events.subscribe()
    }

    pub fn stream_status(&self) -> StreamStatus {
        self.inner.streams.status()
    }

    pub fn recorder_phase(&self) -> RecorderPhase {
        self.inner.recorder.lock().phase()
    }

    pub fn auto_capture_state(&self) -> TriggerState {
        self.inner.trigger.lock().state()
    }

    /// Most recent finalized recording, kept for transcoding
    pub fn last_recording(&self) -> Option<CaptureArtifact> {
        self.inner.last_recording.read().clone()
    }

    /// Record identifier attached to submitted artifacts
    pub fn set_record_id(&self, record_id: Option<String>) {
        *self.inner.record_id.write() = record_id;
    }

    pub fn transcode_job(&self, id: Uuid) -> Option<TranscodeJob> {
        self.inner.jobs.read().get(&id).cloned()
    }

    /// Acquire the camera stream
    ///
    /// Idempotent while a stream is live. A fresh acquisition bumps the
    /// epoch and, when auto-capture is enabled and nothing is
    /// recording, re-arms the detection cycle against the new
    /// generation.
    pub async fn start_stream(&self) -> CaptureResult<StreamStatus> {
        let before = self.inner.streams.epoch();
        self.inner.streams.start().await?;
        let status = self.inner.streams.status();
        if status.epoch != before {
            self.inner.emit(CaptureEvent::StreamStarted {
                epoch: status.epoch,
            });
            let recorder = self.inner.recorder.lock();
            if self.inner.auto_enabled.load(Ordering::SeqCst) && recorder.is_idle() {
                self.inner.spawn_auto_cycle(status.epoch);
            }
        }
        Ok(status)
    }

    /// Release the camera stream
    ///
    /// Tears down the detection cycle, force-finalizes any active
    /// recording, then releases the device. A no-op when no stream is
    /// live.
    pub async fn stop_stream(&self) -> CaptureResult<()> {
        if !self.inner.streams.is_active() {
            return Ok(());
        }

        self.inner.teardown_auto_cycle().await;

        let finalized = self.inner.recorder.lock().force_finalize();
        if let Some(artifact) = finalized {
            self.inner.emit(CaptureEvent::RecordingFinalized {
                filename: artifact.filename.clone(),
                bytes: artifact.payload.len(),
            });
            *self.inner.last_recording.write() = Some(artifact.clone());
            let record_id = self.inner.record_id.read().clone();
            if let Err(e) = self.inner.sink.submit(&artifact, record_id.as_deref()).await {
                tracing::error!(error = %e, "failed to submit force-finalized recording");
                self.inner
                    .emit(CaptureEvent::Error(format!("artifact submission failed: {}", e)));
            }
        }

        self.inner.streams.stop();
        self.inner.emit(CaptureEvent::StreamStopped);
        Ok(())
    }

    /// Enable auto-capture and arm a detection cycle
    ///
    /// Requires a live stream and an idle recorder. A no-op when a
    /// cycle is already armed or mid-fire.
    pub fn arm_auto_capture(&self) -> CaptureResult<()> {
        let status = self.inner.streams.status();
        if !status.active {
            return Err(CaptureError::NoActiveStream);
        }
        // Transitions into Armed and Recording serialize on the
        // recorder lock; the guard spans the idle check and the arm.
        let recorder = self.inner.recorder.lock();
        if !recorder.is_idle() {
            return Err(CaptureError::RecordingActive);
        }

        self.inner.auto_enabled.store(true, Ordering::SeqCst);
        {
            let trigger = self.inner.trigger.lock();
            if matches!(trigger.state(), TriggerState::Armed | TriggerState::Fired) {
                return Ok(());
            }
        }

        self.inner.spawn_auto_cycle(status.epoch);
        Ok(())
    }

    /// Disable auto-capture and stop the detection cycle
    pub async fn disarm_auto_capture(&self) {
        self.inner.auto_enabled.store(false, Ordering::SeqCst);
        self.inner.teardown_auto_cycle().await;
        self.inner.emit(CaptureEvent::AutoCaptureDisarmed);
    }

    /// Capture a still from the current frame and submit it
    pub async fn capture_still(&self) -> CaptureResult<CaptureArtifact> {
        let stream = self
            .inner
            .streams
            .current()
            .ok_or(CaptureError::NoActiveStream)?;
        let frame = stream
            .current_frame()
            .ok_or(StillError::FrameUnavailable)?;
        let record_id = self.inner.record_id.read().clone();
        let artifact = self
            .inner
            .still
            .capture(&frame, &self.inner.owner, record_id.as_deref())
            .await?;
        self.inner.emit(CaptureEvent::StillCaptured {
            filename: artifact.filename.clone(),
            auto: false,
        });
        Ok(artifact)
    }

    /// Begin recording the live stream
    ///
    /// Rejected while the auto-capture cycle is armed or mid-fire.
    pub fn start_recording(&self) -> CaptureResult<()> {
        let stream = self
            .inner
            .streams
            .current()
            .ok_or(CaptureError::NoActiveStream)?;
        // Same guard discipline as arm_auto_capture: the trigger check
        // and the recorder start happen under one recorder guard.
        let mut recorder = self.inner.recorder.lock();
        {
            let trigger = self.inner.trigger.lock();
            if matches!(trigger.state(), TriggerState::Armed | TriggerState::Fired) {
                return Err(CaptureError::AutoCaptureArmed);
            }
        }
        recorder.start(stream)?;
        drop(recorder);
        self.inner.emit(CaptureEvent::RecordingStarted);
        Ok(())
    }

    /// Seal the active recording and submit the artifact
    ///
    /// The finalized artifact is retained as the transcode input even
    /// when submission fails.
    pub async fn stop_recording(&self) -> CaptureResult<CaptureArtifact> {
        let artifact = self.inner.recorder.lock().stop()?;
        self.inner.emit(CaptureEvent::RecordingFinalized {
            filename: artifact.filename.clone(),
            bytes: artifact.payload.len(),
        });
        *self.inner.last_recording.write() = Some(artifact.clone());

        let record_id = self.inner.record_id.read().clone();
        self.inner
            .sink
            .submit(&artifact, record_id.as_deref())
            .await
            .map_err(CaptureError::Submit)?;
        Ok(artifact)
    }

    /// Convert the most recent recording into the configured target
    /// container as a background job
    pub fn request_transcode(&self) -> CaptureResult<Uuid> {
        let input = self
            .inner
            .last_recording
            .read()
            .clone()
            .ok_or(CaptureError::NoRecording)?;
        let target = self.inner.config.target_transcode_format;

        let job = TranscodeJob::pending(&input.filename, target, self.inner.streams.epoch());
        let job_id = job.id;
        self.inner.jobs.write().insert(job_id, job);
        self.inner.emit(CaptureEvent::TranscodeStarted { job: job_id });

        tokio::spawn(run_transcode_job(
            Arc::downgrade(&self.inner),
            job_id,
            input,
            target,
        ));
        Ok(job_id)
    }
}

/// Acts on detection results for one armed cycle
///
/// Results from another stream generation are discarded. A successful
/// fire captures a still, completes the cycle, and shuts the sampling
/// loop down.
async fn consume_detections(
    inner: Weak<Inner>,
    mut results: mpsc::Receiver<DetectionResult>,
    loop_shutdown: Arc<Notify>,
) {
    while let Some(result) = results.recv().await {
        let Some(inner) = inner.upgrade() else {
            tracing::warn!("detection result after session teardown, discarding");
            return;
        };

        let live = inner.streams.status();
        if !live.active || live.epoch != result.epoch {
            tracing::debug!(epoch = result.epoch, "stale detection result discarded");
            continue;
        }

        let fired = inner.trigger.lock().on_score(result.score);
        if !fired {
            continue;
        }
        tracing::info!(score = result.score, "auto-capture threshold crossed");

        let frame = inner.streams.current().and_then(|s| s.current_frame());
        let Some(frame) = frame else {
            tracing::warn!("no frame available for auto-capture, staying armed");
            inner.trigger.lock().rearm_after_miss();
            continue;
        };

        let record_id = inner.record_id.read().clone();
        let outcome = inner
            .still
            .capture(&frame, &inner.owner, record_id.as_deref())
            .await;
        match outcome {
            Ok(artifact) => {
                inner.trigger.lock().complete_fire();
                loop_shutdown.notify_one();
                inner.emit(CaptureEvent::StillCaptured {
                    filename: artifact.filename,
                    auto: true,
                });
                return;
            }
            Err(StillError::FrameUnavailable) => {
                tracing::warn!("frame lost before encode, staying armed");
                inner.trigger.lock().rearm_after_miss();
            }
            Err(e) => {
                // The cycle is spent; surface the failure instead of
                // hammering the sink with refires
                inner.trigger.lock().complete_fire();
                loop_shutdown.notify_one();
                tracing::error!(error = %e, "auto-capture failed after firing");
                inner.emit(CaptureEvent::Error(format!("auto-capture failed: {}", e)));
                return;
            }
        }
    }
}

/// Runs one transcode job in the background
async fn run_transcode_job(
    inner: Weak<Inner>,
    job_id: Uuid,
    input: CaptureArtifact,
    target: TranscodeFormat,
) {
    let Some(strong) = inner.upgrade() else {
        return;
    };
    if let Some(job) = strong.jobs.write().get_mut(&job_id) {
        job.mark_running();
    }
    let pipeline = TranscodePipeline::new(
        strong.engine.clone(),
        target,
        Arc::new(AtomicBool::new(false)),
    );
    let record_id = strong.record_id.read().clone();
    drop(strong);

    let result = pipeline.run(&input).await;

    let Some(strong) = inner.upgrade() else {
        tracing::warn!(job = %job_id, "transcode finished after session teardown, discarding");
        return;
    };
    match result {
        Ok(artifact) => {
            if let Some(job) = strong.jobs.write().get_mut(&job_id) {
                job.mark_succeeded(&artifact.filename);
            }
            match strong.sink.submit(&artifact, record_id.as_deref()).await {
                Ok(()) => {
                    strong.emit(CaptureEvent::TranscodeSucceeded {
                        job: job_id,
                        filename: artifact.filename.clone(),
                    });
                }
                Err(e) => {
                    tracing::error!(job = %job_id, error = %e, "converted artifact submission failed");
                    strong.emit(CaptureEvent::Error(format!(
                        "artifact submission failed: {}",
                        e
                    )));
                }
            }
        }
        Err(e) => {
            tracing::error!(job = %job_id, stage = ?e.stage(), error = %e, "transcode failed");
            if let Some(job) = strong.jobs.write().get_mut(&job_id) {
                job.mark_failed(&e);
            }
            strong.emit(CaptureEvent::TranscodeFailed {
                job: job_id,
                stage: e.stage(),
            });
        }
    }
}
