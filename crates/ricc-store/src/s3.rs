//! The S3-compatible backend (`STORAGE_MODE=s3`).
//!
//! Contains only type signatures and a `StorageWriteFailed` stand-in until a
//! real S3 client is wired in — this spec treats network object storage as
//! out of scope (§1 Non-goals), but the `ObjectStore` seam and configuration
//! parsing are real so a future backend is a drop-in, not a redesign.

use async_trait::async_trait;
use ricc_core::{Config, CoreError};

use crate::store::ObjectStore;

/// Configuration this backend would need to talk to a real S3-compatible
/// endpoint. Validated eagerly so a misconfigured deployment fails at
/// startup rather than on first upload.
#[derive(Debug, Clone)]
pub struct S3Store {
    pub bucket: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl S3Store {
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        if config.s3_bucket.trim().is_empty() {
            return Err(CoreError::StorageWriteFailed {
                key: "S3_BUCKET".to_string(),
                reason: "S3_BUCKET must be set when STORAGE_MODE=s3".to_string(),
            });
        }
        Ok(Self {
            bucket: config.s3_bucket.clone(),
            endpoint_url: Some(config.s3_endpoint_url.clone()).filter(|s| !s.is_empty()),
            access_key_id: config.s3_access_key_id.clone(),
            secret_access_key: config.s3_secret_access_key.clone(),
            region: config.s3_region.clone(),
        })
    }
}

impl S3Store {
    fn not_wired(&self, key: &str) -> CoreError {
        CoreError::StorageWriteFailed {
            key: key.to_string(),
            reason: "S3Store has no real S3 client wired in; configure a collaborator backend"
                .to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_write_once(&self, key: &str, _data: &[u8], _content_type: &str) -> Result<String, CoreError> {
        Err(self.not_wired(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, CoreError> {
        Err(self.not_wired(key))
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, CoreError> {
        Err(self.not_wired(key))
    }

    async fn signed_url(&self, storage_uri: &str, _expires_sec: u32) -> Result<String, CoreError> {
        Err(self.not_wired(storage_uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_bucket(bucket: &str) -> Config {
        std::env::set_var("S3_BUCKET", bucket);
        std::env::set_var("STORAGE_MODE", "s3");
        let cfg = Config::from_env().unwrap();
        std::env::remove_var("S3_BUCKET");
        std::env::remove_var("STORAGE_MODE");
        cfg
    }

    #[test]
    fn from_config_rejects_blank_bucket() {
        let mut cfg = config_with_bucket("epic1");
        cfg.s3_bucket = "   ".to_string();
        assert!(S3Store::from_config(&cfg).is_err());
    }

    #[test]
    fn from_config_succeeds_with_bucket_set() {
        let cfg = config_with_bucket("epic1");
        let store = S3Store::from_config(&cfg).unwrap();
        assert_eq!(store.bucket, "epic1");
    }
}
