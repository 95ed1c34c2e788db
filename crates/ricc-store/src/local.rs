//! The local filesystem backend (`STORAGE_MODE=local`), grounded in
//! `infra/storage.py`'s `LocalStorage`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ricc_core::CoreError;

use crate::store::ObjectStore;
use crate::uri::{format_file_uri, parse_storage_uri, StorageLocation};

/// Writes objects under a root directory, one file per key, creating
/// parent directories as needed. Not safe to share a root across stores
/// configured with different `STORAGE_ROOT`s that resolve to the same path
/// but disagree about write-once semantics — there is exactly one writer
/// role for any given key in this system (§3 ownership rule).
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    /// Creates the store rooted at `root`, creating the directory if it
    /// doesn't exist yet.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await.map_err(|e| CoreError::StorageWriteFailed {
            key: root.display().to_string(),
            reason: e.to_string(),
        })?;
        let root = tokio::fs::canonicalize(&root).await.map_err(|e| CoreError::StorageWriteFailed {
            key: root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { root })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    async fn put_write_once(&self, key: &str, data: &[u8], _content_type: &str) -> Result<String, CoreError> {
        let path = self.full_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| CoreError::StorageWriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        }
        if tokio::fs::metadata(&path).await.is_err() {
            tokio::fs::write(&path, data).await.map_err(|e| CoreError::StorageWriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(format_file_uri(&path.display().to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, CoreError> {
        Ok(tokio::fs::metadata(self.full_path(key)).await.is_ok())
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, CoreError> {
        tokio::fs::read(self.full_path(key)).await.map_err(|e| CoreError::StorageWriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn signed_url(&self, storage_uri: &str, _expires_sec: u32) -> Result<String, CoreError> {
        match parse_storage_uri(storage_uri)? {
            StorageLocation::File { path } => Ok(format_file_uri(&path)),
            StorageLocation::S3 { .. } => Err(CoreError::StorageWriteFailed {
                key: storage_uri.to_string(),
                reason: "local store cannot sign an s3:// uri".to_string(),
            }),
        }
    }
}
