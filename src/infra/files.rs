use anyhow::{anyhow, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Disk-backed store for generated MP3s. Keys are relative paths under the
/// configured root, e.g. `audio/42/<uuid>.mp3`.
#[derive(Clone)]
pub struct AudioStore {
    root: PathBuf,
}

impl AudioStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        // Keys are produced internally, but reject traversal anyway.
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(anyhow!("invalid file key: {}", key));
        }
        Ok(self.root.join(key))
    }

    pub async fn save(&self, key: &str, data: &Bytes) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    pub async fn read(&self, key: &str) -> Result<Bytes> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}
