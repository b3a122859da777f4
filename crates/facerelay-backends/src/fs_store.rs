//! Filesystem-backed blob store: one file per key in a flat directory.

use facerelay_core::storage::validate_key;
use facerelay_core::{BlobReceipt, BlobStore, StoreError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Disambiguates temp files of concurrent writes within this process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(root = %root.display(), "blob store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

async fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(tmp, data).await?;
    tokio::fs::rename(tmp, dest).await
}

impl BlobStore for FsBlobStore {
    /// Write-then-rename, so readers never observe a partial blob.
    async fn put(&self, key: &str, data: &[u8]) -> Result<BlobReceipt, StoreError> {
        let path = self.path_for(key)?;
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!(".{key}.{}.{seq}.tmp", std::process::id()));

        if let Err(e) = write_then_rename(&tmp, &path, data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            tracing::warn!(key, error = %e, "blob write failed");
            return Err(e.into());
        }

        tracing::info!(key, size = data.len(), "blob stored");
        Ok(BlobReceipt::for_contents(key, data))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => {
                tracing::debug!(key, size = data.len(), "blob read");
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
