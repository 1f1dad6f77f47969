//! Capture artifacts
//!
//! Finished captures (stills and videos) and the unified filename scheme
//! they are submitted under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout for artifact filenames: ISO-8601 basic, UTC,
/// millisecond precision. Fixed width, so lexical order is chronological.
const FILENAME_TIMESTAMP: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Payload media type of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Webm,
    Mp4,
}

impl MediaType {
    /// Get the file extension for this media type
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "jpeg",
            MediaType::Webm => "webm",
            MediaType::Mp4 => "mp4",
        }
    }

    /// Get the MIME type string
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webm => "video/webm",
            MediaType::Mp4 => "video/mp4",
        }
    }
}

/// Kind of capture an artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
}

/// A finished capture, ready for submission
///
/// Immutable once created; the payload is never edited in place. The
/// filename extension always matches the payload's actual media type.
#[derive(Clone)]
pub struct CaptureArtifact {
    /// Image or video
    pub kind: ArtifactKind,

    /// Encoded payload bytes
    pub payload: Vec<u8>,

    /// Filename under the `{identity}_{timestamp}.{ext}` scheme
    pub filename: String,

    /// Payload media type
    pub media_type: MediaType,

    /// Identity of the capturing user
    pub owner: String,

    /// When the capture was taken (UTC)
    pub created_at: DateTime<Utc>,
}

impl CaptureArtifact {
    /// Create an artifact, deriving its filename from owner and timestamp
    pub fn new(
        kind: ArtifactKind,
        payload: Vec<u8>,
        owner: &str,
        media_type: MediaType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            payload,
            filename: artifact_filename(owner, created_at, media_type),
            media_type,
            owner: owner.to_string(),
            created_at,
        }
    }
}

impl fmt::Debug for CaptureArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureArtifact")
            .field("kind", &self.kind)
            .field("payload_bytes", &self.payload.len())
            .field("filename", &self.filename)
            .field("media_type", &self.media_type)
            .field("owner", &self.owner)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Build a filename under the unified `{identity}_{timestamp}.{ext}` scheme
pub fn artifact_filename(identity: &str, at: DateTime<Utc>, media_type: MediaType) -> String {
    format!(
        "{}_{}.{}",
        sanitize_identity(identity),
        at.format(FILENAME_TIMESTAMP),
        media_type.extension()
    )
}

/// Replace characters that would break a filename with `-`
pub fn sanitize_identity(identity: &str) -> String {
    identity
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}
