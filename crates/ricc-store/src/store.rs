//! The object-store capability interface (§4.2, §4.4): write-once byte
//! storage behind a uniform trait, so the evidence and artifact services
//! never know which backend wrote a given key.

use async_trait::async_trait;
use ricc_core::CoreError;

/// A content-addressed, write-once byte store.
///
/// `put_write_once` never overwrites an existing key: a second write to the
/// same key is a no-op that returns the URI of what's already there. This
/// is what lets the evidence/artifact services skip existence checks of
/// their own and rely entirely on the store's own idempotence.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `data` under `key` unless it already exists, and returns the
    /// resulting storage URI either way.
    async fn put_write_once(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, CoreError>;

    async fn exists(&self, key: &str) -> Result<bool, CoreError>;

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, CoreError>;

    /// A URL suitable for reading the object back out-of-band. For the
    /// local backend this is a `file://` path; a networked backend (S3)
    /// would return a time-limited presigned URL.
    async fn signed_url(&self, storage_uri: &str, expires_sec: u32) -> Result<String, CoreError>;
}
