//! Blob storage capability and the logical-name allow-list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tokio::sync::RwLock;

/// Logical names accepted by the storage relay, and the blob key each maps to.
const BLOB_NAMES: &[(&str, &str)] = &[
    ("roster", "roster.json"),
    // Legacy alias of "roster"; both resolve to the same blob.
    ("students", "roster.json"),
    ("settings", "settings.json"),
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid blob key: {0:?}")]
    InvalidKey(String),
}

/// A logical blob name that passed the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobName {
    name: &'static str,
    key: &'static str,
}

impl BlobName {
    /// Resolve a client-supplied name. Returns `None` for names outside the allow-list.
    pub fn parse(name: &str) -> Option<Self> {
        BLOB_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(name, key)| Self { name, key })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Backend key the name is stored under.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// All accepted logical names, aliases included.
    pub fn accepted() -> impl Iterator<Item = &'static str> {
        BLOB_NAMES.iter().map(|(n, _)| *n)
    }
}

/// Metadata returned after a successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobReceipt {
    pub key: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub sha256: String,
    pub stored_at: DateTime<Utc>,
}

impl BlobReceipt {
    pub fn for_contents(key: &str, data: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            size: data.len() as u64,
            sha256: format!("{:x}", Sha256::digest(data)),
            stored_at: Utc::now(),
        }
    }
}

/// Opaque key/value blob store.
pub trait BlobStore: Send + Sync + 'static {
    fn put(
        &self,
        key: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<BlobReceipt, StoreError>> + Send;

    /// Fetch a blob. `Ok(None)` means the key has never been written.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    /// Short backend name for status reporting.
    fn name(&self) -> &str;
}

/// Reject keys that could escape a flat namespace.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-process blob store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<BlobReceipt, StoreError> {
        validate_key(key)?;
        self.blobs.write().await.insert(key.to_string(), data.to_vec());
        Ok(BlobReceipt::for_contents(key, data))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_name_allow_list() {
        let roster = BlobName::parse("roster").unwrap();
        assert_eq!(roster.key(), "roster.json");
        assert_eq!(BlobName::parse("settings").unwrap().key(), "settings.json");
        assert!(BlobName::parse("passwd").is_none());
        assert!(BlobName::parse("").is_none());
        assert!(BlobName::parse("Roster").is_none());
    }

    #[test]
    fn test_blob_name_legacy_alias_shares_key() {
        let current = BlobName::parse("roster").unwrap();
        let legacy = BlobName::parse("students").unwrap();
        assert_eq!(current.key(), legacy.key());
        assert_ne!(current.name(), legacy.name());
    }

    #[test]
    fn test_accepted_names_all_parse() {
        for name in BlobName::accepted() {
            assert!(BlobName::parse(name).is_some(), "{name} should parse");
        }
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("roster.json").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key(".hidden").is_err());
    }

    #[test]
    fn test_receipt_digest() {
        let receipt = BlobReceipt::for_contents("k", b"abc");
        assert_eq!(receipt.size, 3);
        assert_eq!(
            receipt.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_memory_store_put_get() {
        let store = MemoryBlobStore::new();
        assert!(store.get("roster.json").await.unwrap().is_none());

        let receipt = store.put("roster.json", b"[1,2,3]").await.unwrap();
        assert_eq!(receipt.key, "roster.json");
        assert_eq!(receipt.size, 7);

        let data = store.get("roster.json").await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"[1,2,3]"[..]));
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryBlobStore::new();
        store.put("settings.json", b"old").await.unwrap();
        store.put("settings.json", b"new").await.unwrap();
        assert_eq!(store.get("settings.json").await.unwrap().unwrap(), b"new");
    }
}
