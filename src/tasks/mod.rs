//! Task orchestration: the asynchronous media-processing pipelines.
//!
//! - `queue`: JSONL task queue with delayed retry
//! - `transcribe`: fetch → normalize → transcribe → persist, per unit
//! - `summarize`: transcript → summary/tags, per item
//! - `worker`: drains the queue and applies the retry policy

pub mod error;
pub mod queue;
pub mod summarize;
pub mod transcribe;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use error::TaskError;
pub use queue::{Job, JobStatus, QueueError, QueueStatus, TaskKind, TaskQueue};
pub use summarize::{run_summarization, SummarizeOutcome};
pub use transcribe::{run_transcription, TranscribeOutcome};
pub use worker::Worker;

/// Retry policy for failed pipeline invocations.
///
/// Retries are scheduled through the queue's delay mechanism, not run
/// synchronously: a failed job is re-enqueued `delay_secs` in the future
/// so the worker is free in the interim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Automatic retries after the first execution
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_delay_secs() -> u64 {
    60
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_secs: default_delay_secs(),
        }
    }
}

impl RetryPolicy {
    /// The fixed inter-attempt delay
    pub fn delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delay_secs as i64)
    }
}
