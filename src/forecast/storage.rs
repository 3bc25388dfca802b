//! Durable model artifact storage
//!
//! One artifact per key, last-write-wins, no versioning. The artifact bytes
//! are opaque here; decoding belongs to the cache layer.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::info;

/// Durable storage for serialized forecast models
#[async_trait]
pub trait ModelStorage: Send + Sync {
    /// Persist an artifact, replacing any previous one for the key
    async fn save(&self, key: &str, artifact: &[u8]) -> Result<()>;

    /// Load an artifact, or `None` if the key has never been saved
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Keys become file names; reject anything that could escape the model dir
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Validation("model key must not be empty".into()));
    }
    if !key
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || key.starts_with('.')
    {
        return Err(Error::Validation(format!(
            "model key '{}' contains characters not allowed in artifact names",
            key
        )));
    }
    Ok(())
}

/// Filesystem-backed model storage: `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FsModelStorage {
    dir: PathBuf,
}

impl FsModelStorage {
    /// Create a store rooted at `dir` (created lazily on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsModelStorage { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl ModelStorage for FsModelStorage {
    async fn save(&self, key: &str, artifact: &[u8]) -> Result<()> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        tokio::fs::write(&path, artifact).await?;
        info!("Persisted model artifact to {}", path.display());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;

        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
