//! Speech-to-text client (OpenAI-compatible transcription endpoint).

use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::Transcriber;

/// Client for a Whisper-style transcription endpoint:
/// multipart POST with a `file` part and a `model` field.
pub struct TranscriptionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl TranscriptionClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self, wav_path: &Path) -> Result<String> {
        let file_name = wav_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file_bytes = tokio::fs::read(wav_path)
            .await
            .with_context(|| format!("failed to read audio file: {}", wav_path.display()))?;

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", file_part);

        debug!(model = %self.model, "submitting audio for transcription");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read transcription response body")?;

        if !status.is_success() {
            bail!("transcription service error ({status}): {body}");
        }

        // The body is persisted verbatim, but it must be JSON carrying at
        // least the transcript text
        let parsed: serde_json::Value =
            serde_json::from_str(&body).context("transcription response is not JSON")?;
        if parsed.get("text").is_none() {
            bail!("transcription response has no `text` field");
        }

        debug!(chars = body.len(), "transcription completed");

        Ok(body)
    }
}
