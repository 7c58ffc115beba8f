//! Transcript artifact storage.
//!
//! One JSON file per audio unit, named deterministically from the unit id,
//! holding the verbatim response body of the transcription service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use uuid::Uuid;

/// Directory of `{unit_id}.json` transcript artifacts
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Deterministic artifact path for a unit
    pub fn path_for(&self, unit_id: Uuid) -> PathBuf {
        self.dir.join(format!("{unit_id}.json"))
    }

    /// Persist an artifact, overwriting any previous attempt's output
    pub async fn store(&self, unit_id: Uuid, content: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create artifact dir: {}", self.dir.display()))?;

        let path = self.path_for(unit_id);
        fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write artifact: {}", path.display()))?;

        Ok(path)
    }

    /// Load an artifact, `None` when no attempt has succeeded yet
    pub async fn load(&self, unit_id: Uuid) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(unit_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read(&path)
            .await
            .with_context(|| format!("failed to read artifact: {}", path.display()))?;
        Ok(Some(content))
    }

    /// Remove a unit's artifact if present (cascade deletion)
    pub async fn remove(&self, unit_id: Uuid) -> Result<()> {
        let path = self.path_for(unit_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to remove artifact: {}", path.display()))
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
