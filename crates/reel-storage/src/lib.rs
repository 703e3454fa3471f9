//! Object store gateway for the reel pipeline.
//!
//! This crate provides:
//! - An [`ObjectStore`] trait with S3-compatible and local-disk backends
//! - Object URI parsing and key resolution
//! - Workspace operations (folders, listings, upload naming, batch deletes)

pub mod config;
pub mod error;
pub mod local;
pub mod ops;
pub mod s3;
pub mod store;
pub mod uri;

use std::sync::Arc;

use tracing::info;

pub use config::{StorageBackend, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use local::LocalStore;
pub use s3::S3Store;
pub use store::{ObjectBody, ObjectInfo, ObjectStore};
pub use uri::{resolve_key, ObjectUri};

/// Build the configured backend.
pub async fn connect(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::S3 => {
            info!(
                bucket = %config.bucket,
                endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
                "Using S3 object store"
            );
            Ok(Arc::new(S3Store::new(config).await?))
        }
        StorageBackend::Local => {
            info!(
                bucket = %config.bucket,
                root = %config.local_root.display(),
                "Using local object store"
            );
            Ok(Arc::new(LocalStore::new(&config.local_root, &config.bucket).await?))
        }
    }
}
