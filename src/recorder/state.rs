//! Recording state management
//!
//! Defines the recorder state machine and chunk accumulation for a
//! single recording session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current phase of the video recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderPhase {
    /// No recording in progress
    Idle,
    /// Accumulating chunks
    Recording,
    /// Stop requested; sealing the session
    Finalizing,
}

impl Default for RecorderPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Chunk accumulation for one recording
///
/// Chunks are append-only and strictly ordered by arrival; finalizing
/// concatenates them byte for byte.
#[derive(Debug)]
pub struct RecordingSession {
    /// Session id for log correlation
    pub id: Uuid,

    /// When recording started
    pub started_at: DateTime<Utc>,

    chunks: Vec<Vec<u8>>,
}

impl RecordingSession {
    /// Begin an empty session starting now
    pub fn begin() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            chunks: Vec::new(),
        }
    }

    /// Append one encoded chunk in arrival order
    pub fn push_chunk(&mut self, data: Vec<u8>) {
        self.chunks.push(data);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total payload size across all chunks
    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Seal the session into one contiguous payload
    pub fn finalize(self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.total_bytes());
        for chunk in &self.chunks {
            payload.extend_from_slice(chunk);
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = RecordingSession::begin();
        assert!(session.is_empty());
        assert_eq!(session.chunk_count(), 0);
        assert_eq!(session.total_bytes(), 0);
    }

    #[test]
    fn test_finalize_concatenates_in_arrival_order() {
        let mut session = RecordingSession::begin();
        session.push_chunk(vec![1, 2, 3]);
        session.push_chunk(vec![4, 5]);
        session.push_chunk(vec![6]);

        let payload = session.finalize();
        assert_eq!(payload, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_total_bytes_sums_chunk_sizes() {
        let mut session = RecordingSession::begin();
        session.push_chunk(vec![0xAA; 1000]);
        session.push_chunk(vec![0xBB; 1000]);
        session.push_chunk(vec![0xCC; 500]);

        assert_eq!(session.chunk_count(), 3);
        assert_eq!(session.total_bytes(), 2500);

        let payload = session.finalize();
        assert_eq!(payload.len(), 2500);
        assert_eq!(payload[0], 0xAA);
        assert_eq!(payload[999], 0xAA);
        assert_eq!(payload[1000], 0xBB);
        assert_eq!(payload[1999], 0xBB);
        assert_eq!(payload[2000], 0xCC);
        assert_eq!(payload[2499], 0xCC);
    }
}
