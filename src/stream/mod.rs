//! Camera stream lifecycle
//!
//! Owns acquisition and release of the hardware stream, plus the epoch
//! counter that tags all work scheduled against a stream generation.

use crate::capture::traits::{DeviceCapture, DeviceError, MediaStream};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Stream activity snapshot published to dependents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    /// Whether a stream is currently live
    pub active: bool,

    /// Generation counter, bumped on every successful start
    pub epoch: u64,
}

/// Errors from stream lifecycle operations
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(#[from] DeviceError),
}

/// Owns the single live camera stream and its epoch
///
/// Every `start` is paired with a `stop` on every exit path: dropping the
/// manager releases the tracks as a backstop.
pub struct StreamManager {
    device: Arc<dyn DeviceCapture>,
    current: Mutex<Option<Arc<dyn MediaStream>>>,
    status_tx: watch::Sender<StreamStatus>,
}

impl StreamManager {
    pub fn new(device: Arc<dyn DeviceCapture>) -> Self {
        let (status_tx, _) = watch::channel(StreamStatus::default());
        Self {
            device,
            current: Mutex::new(None),
            status_tx,
        }
    }

    /// Acquire the camera if not already live
    ///
    /// Idempotent: a second call returns the existing stream without
    /// touching the epoch.
    pub async fn start(&self) -> Result<Arc<dyn MediaStream>, StreamError> {
        if let Some(stream) = self.current.lock().clone() {
            tracing::debug!("stream already active, reusing handle");
            return Ok(stream);
        }

        let stream = self.device.open().await?;

        {
            let mut current = self.current.lock();
            if let Some(existing) = current.clone() {
                // Lost a start/start race; the winner's epoch stands.
                drop(current);
                stream.stop_tracks();
                return Ok(existing);
            }
            *current = Some(stream.clone());
        }

        let mut epoch = 0;
        self.status_tx.send_modify(|status| {
            status.active = true;
            status.epoch += 1;
            epoch = status.epoch;
        });
        tracing::info!(epoch, "camera stream started");
        Ok(stream)
    }

    /// Release the camera; a no-op when already stopped
    pub fn stop(&self) {
        let Some(stream) = self.current.lock().take() else {
            return;
        };
        stream.stop_tracks();
        self.status_tx.send_modify(|status| status.active = false);
        tracing::info!(epoch = self.epoch(), "camera stream stopped");
    }

    /// Subscribe to activity/epoch changes
    pub fn subscribe(&self) -> watch::Receiver<StreamStatus> {
        self.status_tx.subscribe()
    }

    /// Current activity snapshot
    pub fn status(&self) -> StreamStatus {
        *self.status_tx.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.status().active
    }

    /// Epoch of the most recent start
    pub fn epoch(&self) -> u64 {
        self.status().epoch
    }

    /// Handle to the live stream, if any
    pub fn current(&self) -> Option<Arc<dyn MediaStream>> {
        self.current.lock().clone()
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.stop();
    }
}
