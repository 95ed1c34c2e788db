//! `ricc-store` — content-addressed, write-once object storage.
//!
//! The evidence and artifact services depend on [`ObjectStore`], never on
//! [`LocalFsStore`] or [`S3Store`] directly — [`make_store`] picks the
//! backend from [`Config::storage_mode`] once at startup.

pub mod local;
pub mod s3;
pub mod store;
pub mod uri;

pub use local::LocalFsStore;
pub use s3::S3Store;
pub use store::ObjectStore;
pub use uri::{format_file_uri, format_s3_uri, parse_storage_uri, StorageLocation};

use std::sync::Arc;

use ricc_core::{Config, CoreError, StorageMode};

/// Builds the configured object store backend, matching `infra/storage.py`'s
/// `make_storage()`.
pub async fn make_store(config: &Config) -> Result<Arc<dyn ObjectStore>, CoreError> {
    match config.storage_mode {
        StorageMode::Local => {
            let store = LocalFsStore::new(&config.storage_root).await?;
            Ok(Arc::new(store))
        }
        StorageMode::S3 => {
            let store = S3Store::from_config(config)?;
            Ok(Arc::new(store))
        }
    }
}
