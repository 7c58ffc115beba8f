//! Transcription pipeline: fetch, normalize, transcribe, persist.
//!
//! Given an audio unit id, either a transcript artifact is persisted and
//! the unit ends in `success`, or the unit ends in `failed` with no
//! artifact written for this attempt. Scratch files are removed on every
//! exit path.

use anyhow::Context;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::ai::Transcriber;
use crate::domain::AudioUnit;
use crate::media::{fetch_to_file, normalize_to_wav};
use crate::store::{ArtifactStore, CatalogStore};

use super::error::TaskError;

/// Result of one transcription invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscribeOutcome {
    /// Artifact persisted, unit marked `success`
    Transcribed,

    /// Another invocation holds the unit; nothing was done
    AlreadyProcessing,
}

impl std::fmt::Display for TranscribeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcribed => f.write_str("transcribed"),
            Self::AlreadyProcessing => f.write_str("skipped: already processing"),
        }
    }
}

/// Run one transcription invocation for `unit_id`.
///
/// `attempt` is the retry count of the surrounding job (0 on the first
/// execution); it only feeds logging, the retry decision is the queue's.
#[instrument(skip_all, fields(unit_id = %unit_id, attempt))]
pub async fn run_transcription(
    store: &CatalogStore,
    artifacts: &ArtifactStore,
    http: &reqwest::Client,
    transcriber: &dyn Transcriber,
    unit_id: Uuid,
    attempt: u32,
) -> Result<TranscribeOutcome, TaskError> {
    // A missing unit is a caller bug, not a transient condition
    let unit = store.get_unit(unit_id)?;

    // Fenced transition: persisted before any network call, and refused
    // when another invocation is already mid-flight
    if !store.begin_processing(unit_id)? {
        warn!("unit already has an in-flight invocation, skipping");
        return Ok(TranscribeOutcome::AlreadyProcessing);
    }

    match transcribe_unit(artifacts, http, transcriber, &unit).await {
        Ok(artifact_path) => {
            store.mark_unit_success(unit_id, &artifact_path)?;
            info!(artifact = %artifact_path, "transcript persisted");
            Ok(TranscribeOutcome::Transcribed)
        }
        Err(err) => {
            // Persist the failure before re-raising so the status is
            // observable even while the queue waits out the retry delay
            error!(error = %err, "transcription attempt failed");
            store.mark_unit_failed(unit_id)?;
            Err(err)
        }
    }
}

/// The fallible middle of the pipeline: everything between the fence and
/// the terminal status write
async fn transcribe_unit(
    artifacts: &ArtifactStore,
    http: &reqwest::Client,
    transcriber: &dyn Transcriber,
    unit: &AudioUnit,
) -> Result<String, TaskError> {
    // Scratch space lives exactly as long as this function; the TempDir
    // guard removes it on success, failure, and early return alike
    let scratch = tempfile::tempdir().context("failed to create scratch dir")?;

    let fetched = fetch_to_file(http, &unit.source_url, scratch.path())
        .await
        .map_err(TaskError::transient)?;
    debug!(bytes = fetched.len, sha256 = %fetched.sha256, "source audio fetched");

    let wav_path = normalize_to_wav(&fetched.path, scratch.path())?;

    let body = transcriber
        .transcribe(&wav_path)
        .await
        .map_err(TaskError::transient)?;

    let artifact_path = artifacts.store(unit.id, body.as_bytes()).await?;

    Ok(artifact_path.display().to_string())
}
