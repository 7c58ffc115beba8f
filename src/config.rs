//! Configuration for audiostore.
//!
//! Sources (highest priority first):
//! 1. Environment variables (AUDIOSTORE_HOME, OPENAI_API_KEY, ...)
//! 2. Config file ($AUDIOSTORE_HOME/config.yaml)
//! 3. Defaults (~/.audiostore, OpenAI endpoints)
//!
//! API keys come only from the environment, never from the config file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::tasks::RetryPolicy;

const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 512;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ai: AiFileConfig,

    #[serde(default)]
    retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AiFileConfig {
    transcription_url: Option<String>,
    transcription_model: Option<String>,
    completion_url: Option<String>,
    completion_model: Option<String>,
    max_tokens: Option<u32>,
}

/// External AI service settings
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Static API key for both services (from OPENAI_API_KEY)
    pub api_key: Option<String>,
    pub transcription_url: String,
    pub transcription_model: String,
    pub completion_url: String,
    pub completion_model: String,
    pub max_tokens: u32,
}

impl AiConfig {
    /// The API key, required for commands that reach the AI services
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("OPENAI_API_KEY environment variable required")
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// State directory: database, queue log, transcript artifacts
    pub home: PathBuf,
    pub ai: AiConfig,
    pub retry: RetryPolicy,
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let home = match std::env::var("AUDIOSTORE_HOME") {
            Ok(path) => PathBuf::from(path),
            Err(_) => dirs::home_dir()
                .context("failed to determine home directory")?
                .join(".audiostore"),
        };

        let file = load_config_file(&home)?;

        let ai = AiConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            transcription_url: std::env::var("AUDIOSTORE_TRANSCRIPTION_URL")
                .ok()
                .or(file.ai.transcription_url)
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_URL.to_string()),
            transcription_model: file
                .ai
                .transcription_model
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            completion_url: std::env::var("AUDIOSTORE_COMPLETION_URL")
                .ok()
                .or(file.ai.completion_url)
                .unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string()),
            completion_model: file
                .ai
                .completion_model
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            max_tokens: file.ai.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        Ok(Self {
            home,
            ai,
            retry: file.retry.unwrap_or_default(),
        })
    }

    /// Catalog database path
    pub fn db_path(&self) -> PathBuf {
        self.home.join("catalog.db")
    }

    /// Task queue log path
    pub fn queue_path(&self) -> PathBuf {
        self.home.join("task_queue.jsonl")
    }

    /// Transcript artifact directory
    pub fn artifacts_dir(&self) -> PathBuf {
        self.home.join("transcripts")
    }
}

fn load_config_file(home: &std::path::Path) -> Result<ConfigFile> {
    let path = home.join("config.yaml");
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_partial_overrides() {
        let file: ConfigFile = serde_yaml::from_str(
            "ai:\n  completion_model: gpt-4o\nretry:\n  max_retries: 3\n",
        )
        .unwrap();

        assert_eq!(file.ai.completion_model.as_deref(), Some("gpt-4o"));
        assert!(file.ai.transcription_url.is_none());
        assert_eq!(file.retry.unwrap().max_retries, 3);
    }

    #[test]
    fn test_empty_config_file() {
        let file: ConfigFile = serde_yaml::from_str("{}").unwrap();
        assert!(file.retry.is_none());
        assert!(file.ai.max_tokens.is_none());
    }
}
