//! Detection sampling loop
//!
//! Periodically reads the live frame and forwards it to the detector,
//! with a hard at-most-one-in-flight bound. Ticks that would overlap an
//! outstanding detector call are dropped, never queued, so a slow
//! detector can never build a backlog.

use crate::capture::traits::{Detector, DetectorError, MediaStream, Region};
use crate::stream::StreamStatus;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One detector outcome, tagged with the stream generation it was
/// sampled from
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Confidence score (0.0 to 1.0)
    pub score: f32,

    /// Face bounding box, when the detector reports one
    pub region: Option<Region>,

    /// Capture time of the sampled frame
    pub timestamp: DateTime<Utc>,

    /// Stream epoch at the time the frame was sampled
    pub epoch: u64,
}

/// Handle to a running detection loop task
///
/// The loop exits on [`stop`], on the stream going inactive, or on the
/// epoch moving past the one it was spawned for. The consumer of the
/// result channel still compares each result's epoch against the live
/// epoch, since a detector call in flight at shutdown resolves late.
///
/// [`stop`]: DetectionLoop::stop
pub struct DetectionLoop {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<Notify>,
}

impl DetectionLoop {
    /// Spawn the loop against the given stream generation
    pub fn spawn(
        detector: Arc<dyn Detector>,
        stream: Arc<dyn MediaStream>,
        epoch: u64,
        interval: Duration,
        mut status: watch::Receiver<StreamStatus>,
        results: mpsc::Sender<DetectionResult>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_rx = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let in_flight = Arc::new(AtomicBool::new(false));
            let mut dropped: u64 = 0;

            loop {
                tokio::select! {
                    _ = shutdown_rx.notified() => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let live = *status.borrow();
                        if !live.active || live.epoch != epoch {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if in_flight.load(Ordering::Acquire) {
                            dropped += 1;
                            continue;
                        }
                        let Some(frame) = stream.current_frame() else {
                            continue;
                        };
                        in_flight.store(true, Ordering::Release);

                        let detector = detector.clone();
                        let results = results.clone();
                        let gate = in_flight.clone();
                        tokio::spawn(async move {
                            let outcome = detector.detect(&frame).await;
                            gate.store(false, Ordering::Release);
                            match outcome {
                                Ok(detection) => {
                                    let result = DetectionResult {
                                        score: detection.score,
                                        region: detection.region,
                                        timestamp: frame.captured_at,
                                        epoch,
                                    };
                                    let _ = results.send(result).await;
                                }
                                Err(DetectorError::Unavailable) => {
                                    tracing::debug!("detector not ready, tick skipped");
                                }
                            }
                        });
                    }
                }
            }

            tracing::debug!(epoch, dropped_ticks = dropped, "detection loop exited");
        });

        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    /// Shared handle that stops the loop when notified
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
