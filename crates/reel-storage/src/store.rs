//! Backend-neutral object store interface.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::error::StorageResult;

/// Chunked object contents, read lazily from the backend.
pub type ObjectBody = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// Information about a stored object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp (milliseconds since epoch)
    pub last_modified: Option<u64>,
}

/// A single bucket of objects addressed by `/`-separated keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// URI scheme of this backend (`s3`, `file`).
    fn scheme(&self) -> &str;

    /// Bucket all keys live in.
    fn bucket(&self) -> &str;

    /// Full URI of `key`.
    fn uri_for(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme(), self.bucket(), key)
    }

    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()>;

    /// Download `key` to `path`, creating parent directories.
    async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()>;

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Open `key` for streaming. A missing object fails here, before any chunk.
    async fn download_stream(&self, key: &str) -> StorageResult<ObjectBody>;

    /// All objects whose key starts with `prefix`.
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Immediate child "folders" of `prefix`, each ending in `/`.
    async fn list_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete one object. Deleting a missing key is not an error.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// Delete several objects, returning how many were requested.
    async fn delete_objects(&self, keys: &[String]) -> StorageResult<u32> {
        for key in keys {
            self.delete_object(key).await?;
        }
        Ok(keys.len() as u32)
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    async fn check_connectivity(&self) -> StorageResult<()>;
}
