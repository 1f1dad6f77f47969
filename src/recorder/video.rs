//! Video recorder
//!
//! Start/stop recording over the live stream's encoded chunk channel,
//! with ordered accumulation and a byte-exact finalize.

use super::state::{RecorderPhase, RecordingSession};
use crate::artifact::{ArtifactKind, CaptureArtifact, MediaType};
use crate::capture::traits::MediaStream;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors from recorder operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording in progress")]
    NotRecording,

    #[error("recording produced no chunks")]
    EmptyRecording,
}

struct RecorderState {
    phase: RecorderPhase,
    session: Option<RecordingSession>,
    container: MediaType,
}

/// Accumulates encoded chunks from the live stream into a single
/// finalized artifact
///
/// The chunk list has exactly one writer; chunks that arrive outside the
/// Recording phase are ignored, which defends against late flush
/// callbacks after a stop.
pub struct VideoRecorder {
    owner: String,
    flush_interval: Duration,
    state: Arc<Mutex<RecorderState>>,
    pump: Option<JoinHandle<()>>,
}

impl VideoRecorder {
    pub fn new(owner: impl Into<String>, flush_interval: Duration) -> Self {
        Self {
            owner: owner.into(),
            flush_interval,
            state: Arc::new(Mutex::new(RecorderState {
                phase: RecorderPhase::Idle,
                session: None,
                container: MediaType::Webm,
            })),
            pump: None,
        }
    }

    /// Current recorder phase
    pub fn phase(&self) -> RecorderPhase {
        self.state.lock().phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == RecorderPhase::Idle
    }

    /// Begin accumulating chunks from the given stream
    pub fn start(&mut self, stream: Arc<dyn MediaStream>) -> Result<(), RecorderError> {
        {
            let mut state = self.state.lock();
            if state.phase != RecorderPhase::Idle {
                return Err(RecorderError::AlreadyRecording);
            }
            let session = RecordingSession::begin();
            tracing::info!(session = %session.id, container = ?stream.container(), "recording started");
            state.container = stream.container();
            state.session = Some(session);
            state.phase = RecorderPhase::Recording;
        }

        let mut chunks = stream.encoded_chunks(self.flush_interval);
        let state = self.state.clone();
        self.pump = Some(tokio::spawn(async move {
            while let Some(chunk) = chunks.recv().await {
                Self::accept_chunk(&state, chunk);
            }
            tracing::debug!("chunk channel closed");
        }));

        Ok(())
    }

    /// Append one encoded chunk; ignored outside the Recording phase
    pub fn on_chunk(&self, data: Vec<u8>) {
        Self::accept_chunk(&self.state, data);
    }

    fn accept_chunk(state: &Mutex<RecorderState>, data: Vec<u8>) {
        let mut state = state.lock();
        if state.phase != RecorderPhase::Recording {
            tracing::debug!(bytes = data.len(), "chunk outside recording phase ignored");
            return;
        }
        if let Some(session) = state.session.as_mut() {
            session.push_chunk(data);
        }
    }

    /// Seal the session into a single artifact
    ///
    /// With zero accumulated chunks this fails with `EmptyRecording` and
    /// leaves the recorder in `Recording`, so a retry can succeed once
    /// the stream has flushed.
    pub fn stop(&mut self) -> Result<CaptureArtifact, RecorderError> {
        {
            let mut state = self.state.lock();
            if state.phase != RecorderPhase::Recording {
                return Err(RecorderError::NotRecording);
            }
            let empty = state
                .session
                .as_ref()
                .map_or(true, RecordingSession::is_empty);
            if empty {
                return Err(RecorderError::EmptyRecording);
            }
            state.phase = RecorderPhase::Finalizing;
        }

        // The gate above is closed; anything the pump still delivers is
        // dropped before the task is torn down.
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        let mut state = self.state.lock();
        let Some(session) = state.session.take() else {
            state.phase = RecorderPhase::Idle;
            return Err(RecorderError::NotRecording);
        };
        let container = state.container;
        state.phase = RecorderPhase::Idle;
        drop(state);

        let session_id = session.id;
        let chunk_count = session.chunk_count();
        let payload = session.finalize();
        let artifact = CaptureArtifact::new(
            ArtifactKind::Video,
            payload,
            &self.owner,
            container,
            Utc::now(),
        );
        tracing::info!(
            session = %session_id,
            chunks = chunk_count,
            bytes = artifact.payload.len(),
            filename = %artifact.filename,
            "recording finalized"
        );
        Ok(artifact)
    }

    /// Forced teardown for when the stream is stopping
    ///
    /// An empty session is discarded rather than surfaced as an error;
    /// returns the finalized artifact when there is one.
    pub fn force_finalize(&mut self) -> Option<CaptureArtifact> {
        match self.stop() {
            Ok(artifact) => Some(artifact),
            Err(RecorderError::EmptyRecording) => {
                {
                    let mut state = self.state.lock();
                    state.session = None;
                    state.phase = RecorderPhase::Idle;
                }
                if let Some(pump) = self.pump.take() {
                    pump.abort();
                }
                tracing::warn!("empty recording discarded on stream stop");
                None
            }
            Err(_) => None,
        }
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::Frame;
    use tokio::sync::mpsc;

    struct ChunkStream {
        rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
        _tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    }

    impl ChunkStream {
        /// Stream whose chunk channel delivers `chunks` and then closes
        fn preloaded(chunks: Vec<Vec<u8>>) -> Self {
            let (tx, rx) = mpsc::channel(chunks.len().max(1));
            for chunk in chunks {
                tx.try_send(chunk).unwrap();
            }
            Self {
                rx: Mutex::new(Some(rx)),
                _tx: Mutex::new(None),
            }
        }

        /// Stream whose chunk channel stays open but never delivers
        fn silent() -> Self {
            let (tx, rx) = mpsc::channel(1);
            Self {
                rx: Mutex::new(Some(rx)),
                _tx: Mutex::new(Some(tx)),
            }
        }
    }

    impl MediaStream for ChunkStream {
        fn current_frame(&self) -> Option<Frame> {
            None
        }

        fn encoded_chunks(&self, _flush_interval: Duration) -> mpsc::Receiver<Vec<u8>> {
            self.rx.lock().take().unwrap_or_else(|| {
                let (_tx, rx) = mpsc::channel(1);
                rx
            })
        }

        fn container(&self) -> MediaType {
            MediaType::Webm
        }

        fn stop_tracks(&self) {}
    }

    fn recorder() -> VideoRecorder {
        VideoRecorder::new("dana@example.com", Duration::from_millis(1000))
    }

    #[test]
    fn test_stop_without_start_is_not_recording() {
        let mut rec = recorder();
        assert_eq!(rec.stop().unwrap_err(), RecorderError::NotRecording);
        assert_eq!(rec.phase(), RecorderPhase::Idle);
    }

    #[tokio::test]
    async fn test_double_start_is_already_recording() {
        let mut rec = recorder();
        rec.start(Arc::new(ChunkStream::silent())).unwrap();
        let err = rec.start(Arc::new(ChunkStream::silent())).unwrap_err();
        assert_eq!(err, RecorderError::AlreadyRecording);
    }

    #[tokio::test]
    async fn test_empty_stop_fails_and_allows_retry() {
        let mut rec = recorder();
        rec.start(Arc::new(ChunkStream::silent())).unwrap();

        assert_eq!(rec.stop().unwrap_err(), RecorderError::EmptyRecording);
        // Still recording; a later flush can save the session
        assert_eq!(rec.phase(), RecorderPhase::Recording);

        rec.on_chunk(vec![1, 2, 3]);
        let artifact = rec.stop().unwrap();
        assert_eq!(artifact.payload, vec![1, 2, 3]);
        assert_eq!(rec.phase(), RecorderPhase::Idle);
    }

    #[tokio::test]
    async fn test_finalize_is_byte_exact_concat() {
        let mut rec = recorder();
        rec.start(Arc::new(ChunkStream::silent())).unwrap();

        rec.on_chunk(vec![0xAA; 1000]);
        rec.on_chunk(vec![0xBB; 1000]);
        rec.on_chunk(vec![0xCC; 500]);

        let artifact = rec.stop().unwrap();
        assert_eq!(artifact.payload.len(), 2500);
        assert_eq!(artifact.payload[0], 0xAA);
        assert_eq!(artifact.payload[1000], 0xBB);
        assert_eq!(artifact.payload[2000], 0xCC);
        assert_eq!(artifact.kind, ArtifactKind::Video);
        assert_eq!(artifact.media_type, MediaType::Webm);
        assert!(artifact.filename.ends_with(".webm"));
    }

    #[tokio::test]
    async fn test_late_chunks_after_stop_are_ignored() {
        let mut rec = recorder();
        rec.start(Arc::new(ChunkStream::silent())).unwrap();
        rec.on_chunk(vec![1]);
        let artifact = rec.stop().unwrap();
        assert_eq!(artifact.payload, vec![1]);

        // A straggler flush lands after finalize
        rec.on_chunk(vec![9, 9, 9]);
        assert_eq!(rec.phase(), RecorderPhase::Idle);

        // The next session starts clean
        rec.start(Arc::new(ChunkStream::silent())).unwrap();
        assert_eq!(rec.stop().unwrap_err(), RecorderError::EmptyRecording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_feeds_chunks_from_stream() {
        let mut rec = recorder();
        let stream = Arc::new(ChunkStream::preloaded(vec![vec![7; 10], vec![8; 5]]));
        rec.start(stream).unwrap();

        // Let the pump task drain the channel
        tokio::time::sleep(Duration::from_millis(10)).await;

        let artifact = rec.stop().unwrap();
        assert_eq!(artifact.payload.len(), 15);
        assert_eq!(artifact.payload[0], 7);
        assert_eq!(artifact.payload[10], 8);
    }

    #[tokio::test]
    async fn test_force_finalize_discards_empty_session() {
        let mut rec = recorder();
        rec.start(Arc::new(ChunkStream::silent())).unwrap();

        assert!(rec.force_finalize().is_none());
        assert_eq!(rec.phase(), RecorderPhase::Idle);
    }

    #[tokio::test]
    async fn test_force_finalize_returns_artifact_when_chunks_exist() {
        let mut rec = recorder();
        rec.start(Arc::new(ChunkStream::silent())).unwrap();
        rec.on_chunk(vec![5; 100]);

        let artifact = rec.force_finalize().unwrap();
        assert_eq!(artifact.payload.len(), 100);
        assert_eq!(rec.phase(), RecorderPhase::Idle);
    }

    #[test]
    fn test_force_finalize_when_idle_is_noop() {
        let mut rec = recorder();
        assert!(rec.force_finalize().is_none());
    }
}
