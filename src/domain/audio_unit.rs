//! Audio units: the individually transcribed segments of a catalog item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Processing state of a unit's transcription.
///
/// Transitions happen only through the catalog store's fenced update
/// methods, so concurrent readers always observe a persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Created, no invocation dispatched yet
    Pending,

    /// An invocation is in flight
    Processing,

    /// Transcript artifact persisted
    Success,

    /// Last invocation failed (may be retried)
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored status string does not name a known state
#[derive(Debug, Error)]
#[error("unknown processing status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for ProcessingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One uploaded audio segment belonging to a catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioUnit {
    /// Unique identifier
    pub id: Uuid,

    /// The catalog item this unit belongs to
    pub item_id: Uuid,

    /// Position within the item's playback sequence (not required unique)
    pub ordinal: u32,

    /// Remote audio locator, immutable once set
    pub source_url: String,

    /// Reference to the stored transcript artifact, absent until a
    /// transcription attempt succeeds
    pub transcript_path: Option<String>,

    /// Current processing status
    pub status: ProcessingStatus,

    /// When the unit was registered
    pub created_at: DateTime<Utc>,
}

impl AudioUnit {
    /// Create a new pending unit
    pub fn new(item_id: Uuid, ordinal: u32, source_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            ordinal,
            source_url: source_url.into(),
            transcript_path: None,
            status: ProcessingStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Whether a transcript artifact has been persisted for this unit
    pub fn has_transcript(&self) -> bool {
        self.transcript_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Success,
            ProcessingStatus::Failed,
        ] {
            let parsed: ProcessingStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result = "done".parse::<ProcessingStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn test_new_unit_is_pending() {
        let unit = AudioUnit::new(Uuid::new_v4(), 3, "https://blobs/audio/a.mp3");
        assert_eq!(unit.status, ProcessingStatus::Pending);
        assert!(!unit.has_transcript());
        assert_eq!(unit.ordinal, 3);
    }
}
