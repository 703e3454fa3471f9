//! Storage configuration.

use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};

/// Which backend holds the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Any S3-compatible endpoint (AWS, R2, MinIO)
    S3,
    /// A directory on local disk
    Local,
}

/// Configuration for the object store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket name
    pub bucket: String,
    /// Custom S3 endpoint; AWS when unset
    pub endpoint_url: Option<String>,
    /// Region ("auto" for R2)
    pub region: String,
    /// Static credentials; the default AWS provider chain is used when unset
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Path-style addressing, required by most non-AWS endpoints
    pub force_path_style: bool,
    /// Root directory for the local backend
    pub local_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "reel-local".to_string(),
            endpoint_url: None,
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            force_path_style: true,
            local_root: PathBuf::from("/tmp/reel-storage"),
        }
    }
}

impl StorageConfig {
    /// Local backend rooted at `root`.
    pub fn local(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: bucket.into(),
            local_root: root.into(),
            ..Default::default()
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let defaults = Self::default();

        let backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" => StorageBackend::S3,
            "local" => StorageBackend::Local,
            other => {
                return Err(StorageError::config_error(format!(
                    "Unknown STORAGE_BACKEND '{}', expected 's3' or 'local'",
                    other
                )))
            }
        };

        let bucket = match (backend, std::env::var("STORAGE_BUCKET")) {
            (_, Ok(bucket)) if !bucket.trim().is_empty() => bucket,
            (StorageBackend::Local, _) => defaults.bucket.clone(),
            (StorageBackend::S3, _) => {
                return Err(StorageError::config_error("STORAGE_BUCKET not set"))
            }
        };

        let access_key_id = std::env::var("STORAGE_ACCESS_KEY_ID").ok();
        let secret_access_key = std::env::var("STORAGE_SECRET_ACCESS_KEY").ok();
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "STORAGE_ACCESS_KEY_ID and STORAGE_SECRET_ACCESS_KEY must be set together",
            ));
        }

        Ok(Self {
            backend,
            bucket,
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL").ok(),
            region: std::env::var("STORAGE_REGION").unwrap_or(defaults.region),
            access_key_id,
            secret_access_key,
            force_path_style: std::env::var("STORAGE_FORCE_PATH_STYLE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.force_path_style),
            local_root: std::env::var("STORAGE_LOCAL_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_root),
        })
    }
}
