//! Summarization client (OpenAI-compatible chat-completion endpoint).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ItemSummary, Summarizer};

/// Transcripts are clipped before prompting; one paragraph of summary
/// does not need the whole book
const MAX_TRANSCRIPT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You summarize audiobooks for a store catalog. \
Reply with strict JSON of the form {\"summary\": \"<one paragraph>\", \
\"tags\": [\"<tag>\", ...]} with at most 3 short tags, and nothing else.";

/// Client for a chat-completion endpoint whose reply content is itself a
/// JSON document with `summary` and `tags` keys.
pub struct SummarizationClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl SummarizationClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl Summarizer for SummarizationClient {
    async fn summarize(&self, transcript: &str) -> Result<ItemSummary> {
        let clipped = clip(transcript, MAX_TRANSCRIPT_CHARS);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: clipped,
                },
            ],
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, chars = clipped.len(), "requesting summary");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("summarization request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("summarization service error ({status}): {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("summarization response is not valid JSON")?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .context("summarization response has no choices")?;

        // The service occasionally returns prose instead of the requested
        // JSON; the orchestrator retries on a resampled completion
        let summary: ItemSummary = serde_json::from_str(content.trim())
            .context("summarization content is not the requested JSON shape")?;

        Ok(summary)
    }
}

/// Clip to at most `max` characters on a char boundary
fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
