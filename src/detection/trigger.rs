//! Auto-capture trigger
//!
//! Debounced threshold logic over detection scores. One arm cycle fires
//! at most once, no matter how many consecutive scores cross the
//! threshold.

use serde::{Deserialize, Serialize};

/// Trigger readiness states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    /// Accepting detection scores
    Armed,
    /// Threshold crossed; a capture is in progress
    Fired,
    /// Ignoring detection scores until re-armed
    Disarmed,
}

/// Single-fire threshold trigger over detection scores
///
/// Pure synchronous state machine; the orchestrator drives it from the
/// detection result consumer.
#[derive(Debug)]
pub struct AutoCaptureController {
    threshold: f32,
    state: TriggerState,
}

impl AutoCaptureController {
    /// Create a disarmed controller with the given firing threshold
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: TriggerState::Disarmed,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Begin a fresh arm cycle
    pub fn arm(&mut self) {
        self.state = TriggerState::Armed;
    }

    /// End the cycle; further scores are ignored
    pub fn disarm(&mut self) {
        self.state = TriggerState::Disarmed;
    }

    /// Feed one detection score
    ///
    /// Returns `true` when this score fires the trigger. Fires only from
    /// `Armed`, so a cycle fires at most once.
    pub fn on_score(&mut self, score: f32) -> bool {
        if self.state != TriggerState::Armed || score < self.threshold {
            return false;
        }
        self.state = TriggerState::Fired;
        true
    }

    /// Mark the fired capture as delivered, consuming the cycle
    pub fn complete_fire(&mut self) {
        if self.state == TriggerState::Fired {
            self.state = TriggerState::Disarmed;
        }
    }

    /// Hand the cycle back after a fire attempt found no frame; the next
    /// score may fire again
    pub fn rearm_after_miss(&mut self) {
        if self.state == TriggerState::Fired {
            self.state = TriggerState::Armed;
        }
    }
}
