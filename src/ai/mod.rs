//! External AI service adapters.
//!
//! Each adapter wraps a single HTTP call: build the request, attach the
//! API key, submit, surface the parsed body or fail on non-2xx. They are
//! stateless protocol adapters; retry is the task orchestrator's job.

pub mod summarization;
pub mod transcription;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use summarization::SummarizationClient;
pub use transcription::TranscriptionClient;

/// Summary and tags derived from a transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    pub summary: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe canonical-format audio.
    ///
    /// Returns the verbatim JSON response body; callers persist it
    /// unaltered as the transcript artifact.
    async fn transcribe(&self, wav_path: &Path) -> Result<String>;
}

/// Language-completion backend deriving summaries from transcript text
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<ItemSummary>;
}
