//! Summarization pipeline: derive an item's description and tags from its
//! first transcribed unit.
//!
//! Either both fields are overwritten from a successful completion, or the
//! item is left untouched. An item with no transcribed units is a valid
//! steady state, not an error.

use anyhow::anyhow;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::ai::Summarizer;
use crate::store::{ArtifactStore, CatalogStore};

use super::error::TaskError;

/// Result of one summarization invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizeOutcome {
    /// Description and tags overwritten
    Summarized,

    /// No unit has a transcript yet; nothing was changed
    NoTranscript,
}

impl std::fmt::Display for SummarizeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summarized => f.write_str("summarized"),
            Self::NoTranscript => f.write_str("no transcription"),
        }
    }
}

/// Run one summarization invocation for `item_id`.
///
/// The source transcript is the earliest-created unit with an artifact,
/// independent of ordinal: sibling transcriptions finish in any order, and
/// whichever was uploaded first wins once transcribed.
#[instrument(skip_all, fields(item_id = %item_id, attempt))]
pub async fn run_summarization(
    store: &CatalogStore,
    artifacts: &ArtifactStore,
    summarizer: &dyn Summarizer,
    item_id: Uuid,
    attempt: u32,
) -> Result<SummarizeOutcome, TaskError> {
    let mut item = store.get_item(item_id)?;

    let Some(unit) = store.first_transcribed_unit(item_id)? else {
        info!("no transcribed unit yet, nothing to summarize");
        return Ok(SummarizeOutcome::NoTranscript);
    };

    let raw = artifacts
        .load(unit.id)
        .await?
        .ok_or_else(|| anyhow!("transcript artifact missing for unit {}", unit.id))
        .map_err(TaskError::Internal)?;

    let text = transcript_text(&raw);

    let summary = match summarizer.summarize(&text).await {
        Ok(summary) => summary,
        Err(err) => {
            // The item's fields stay at their prior values; the queue
            // decides whether another attempt is warranted
            error!(error = %err, "summarization attempt failed");
            return Err(TaskError::transient(err));
        }
    };

    // Single persisted update: both fields change or neither does
    item.apply_summary(&summary.summary, &summary.tags);
    store.update_summary(item.id, &item.description, &item.tags)?;

    info!(tags = %item.tags, "summary persisted");
    Ok(SummarizeOutcome::Summarized)
}

/// Extract the textual field from a transcript artifact, falling back to
/// the raw content when the artifact is not the expected JSON shape
fn transcript_text(raw: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(raw) {
        if let Some(text) = value.get("text").and_then(|t| t.as_str()) {
            return text.to_string();
        }
    }
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_text_extracts_field() {
        assert_eq!(
            transcript_text(br#"{"text":"hello world","language":"en"}"#),
            "hello world"
        );
    }

    #[test]
    fn test_transcript_text_falls_back_to_raw() {
        assert_eq!(transcript_text(b"plain words"), "plain words");
        // JSON without a text field also falls back to the raw content
        assert_eq!(
            transcript_text(br#"{"words":["a","b"]}"#),
            r#"{"words":["a","b"]}"#
        );
    }
}
