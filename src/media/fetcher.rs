//! Media fetcher: buffered download of remote audio into scratch storage.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

/// A fetched audio object in scratch storage
#[derive(Debug, Clone)]
pub struct FetchedAudio {
    /// Scratch file holding the full body
    pub path: PathBuf,

    /// Body length in bytes
    pub len: u64,

    /// SHA-256 of the body (hex)
    pub sha256: String,
}

/// Download a URL in full and write it to a fresh file inside `dir`.
///
/// The body is buffered before the write; audio sizes are bounded by the
/// upload limits the storage collaborator enforces, so no streaming is
/// needed. A non-2xx response is an error.
pub async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    dir: &Path,
) -> Result<FetchedAudio> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("audio download request failed: {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("audio download failed with status {status}: {url}");
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("audio download body failed: {url}"))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = hex::encode(hasher.finalize());

    let path = dir.join("source.audio");
    fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write scratch file: {}", path.display()))?;

    debug!(bytes = bytes.len(), %sha256, "audio fetched to scratch");

    Ok(FetchedAudio {
        path,
        len: bytes.len() as u64,
        sha256,
    })
}
