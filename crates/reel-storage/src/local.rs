//! Filesystem-backed object store for local development and tests.
//!
//! Keys map onto paths below the root directory. Listing walks the whole
//! tree, so this backend is meant for small working sets.

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectBody, ObjectInfo, ObjectStore};

/// Read size for streamed downloads.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    bucket: String,
}

impl LocalStore {
    /// Create a store rooted at `root`, creating the directory.
    pub async fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            bucket: bucket.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path below the root.
    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let bad_segment = key
            .split('/')
            .any(|s| s.is_empty() || s == "." || s == "..");
        if bad_segment || key.contains('\\') {
            return Err(StorageError::invalid_key(key));
        }
        Ok(self.root.join(key))
    }

    /// Key of a path below the root, `/`-separated.
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }

    async fn walk(&self) -> StorageResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                let path = entry.path();
                if metadata.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    objects.push(ObjectInfo {
                        key,
                        size: metadata.len(),
                        last_modified: metadata
                            .modified()
                            .ok()
                            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                            .map(|d| d.as_millis() as u64),
                    });
                }
            }
        }

        Ok(objects)
    }
}

async fn ensure_parent(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn scheme(&self) -> &str {
        "file"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload_file(&self, path: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let target = self.path_for(key)?;
        debug!("Copying {} to {}", path.display(), target.display());

        ensure_parent(&target).await?;
        tokio::fs::copy(path, &target)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str, _content_type: &str) -> StorageResult<()> {
        let target = self.path_for(key)?;
        ensure_parent(&target).await?;
        tokio::fs::write(&target, data)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;
        Ok(())
    }

    async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()> {
        let source = self.path_for(key)?;
        if !tokio::fs::try_exists(&source).await? {
            return Err(StorageError::not_found(key));
        }
        ensure_parent(path).await?;
        tokio::fs::copy(&source, path)
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", key, e)))?;
        Ok(())
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let source = self.path_for(key)?;
        match tokio::fs::read(&source).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(StorageError::download_failed(format!("{}: {}", key, e))),
        }
    }

    async fn download_stream(&self, key: &str) -> StorageResult<ObjectBody> {
        let source = self.path_for(key)?;
        if !tokio::fs::metadata(&source).await.is_ok_and(|m| m.is_file()) {
            return Err(StorageError::not_found(key));
        }
        let file = tokio::fs::File::open(&source)
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", key, e)))?;

        let body = stream::try_unfold(file, |mut file| async move {
            let mut chunk = vec![0u8; STREAM_CHUNK_SIZE];
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                return Ok::<_, std::io::Error>(None);
            }
            chunk.truncate(read);
            Ok(Some((chunk, file)))
        });
        Ok(body.boxed())
    }

    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let mut objects: Vec<ObjectInfo> = self
            .walk()
            .await?
            .into_iter()
            .filter(|o| o.key.starts_with(prefix))
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn list_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut prefixes: Vec<String> = self
            .list_objects(prefix)
            .await?
            .into_iter()
            .filter_map(|o| {
                let rest = o.key.strip_prefix(prefix)?;
                let (child, _) = rest.split_once('/')?;
                Some(format!("{}{}/", prefix, child))
            })
            .collect();
        prefixes.dedup();
        Ok(prefixes)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()))
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::delete_failed(format!("{}: {}", key, e))),
        }
    }

    async fn presign_get(&self, _key: &str, _expires_in: Duration) -> StorageResult<String> {
        Err(StorageError::Unsupported("presigned URLs"))
    }

    async fn presign_put(
        &self,
        _key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Err(StorageError::Unsupported("presigned URLs"))
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        let metadata = tokio::fs::metadata(&self.root).await?;
        if !metadata.is_dir() {
            return Err(StorageError::Backend(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("bucket"), "test-bucket").await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let (dir, store) = store().await;

        store
            .upload_bytes(b"hello".to_vec(), "ws/metadata/a.json", "application/json")
            .await
            .unwrap();
        assert!(store.exists("ws/metadata/a.json").await.unwrap());

        let target = dir.path().join("out").join("a.json");
        store.download_file("ws/metadata/a.json", &target).await.unwrap();
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let (_dir, store) = store().await;
        assert!(store.download_bytes("ws/none.mp4").await.unwrap_err().is_not_found());
        assert!(!store.exists("ws/none.mp4").await.unwrap());
        store.delete_object("ws/none.mp4").await.unwrap();
    }

    #[tokio::test]
    async fn test_download_stream_yields_whole_object() {
        let (_dir, store) = store().await;
        let data: Vec<u8> = (0..STREAM_CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        store.upload_bytes(data.clone(), "ws/clips/big.mp4", "video/mp4").await.unwrap();

        let chunks: Vec<Vec<u8>> = store
            .download_stream("ws/clips/big.mp4")
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), data);

        assert!(store.download_stream("ws/clips/none.mp4").await.err().unwrap().is_not_found());
        assert!(store.download_stream("ws/clips").await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let (_dir, store) = store().await;
        for key in ["../etc/passwd", "/abs", "ws/", "", "a/./b", "a//b"] {
            let result = store.upload_bytes(vec![], key, "text/plain").await;
            assert!(matches!(result, Err(StorageError::InvalidKey(_))), "{key}");
        }
    }

    #[tokio::test]
    async fn test_list_objects_and_prefixes() {
        let (_dir, store) = store().await;
        for key in ["a/uploads/x.mp4", "a/clips/y.mp4", "b/segments/z.mp4", "top.txt"] {
            store.upload_bytes(vec![1], key, "video/mp4").await.unwrap();
        }

        let keys: Vec<String> = store
            .list_objects("a/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["a/clips/y.mp4", "a/uploads/x.mp4"]);

        assert_eq!(store.list_prefixes("").await.unwrap(), vec!["a/", "b/"]);
        assert_eq!(
            store.list_prefixes("a/").await.unwrap(),
            vec!["a/clips/", "a/uploads/"]
        );
    }

    #[tokio::test]
    async fn test_uri_and_presign() {
        let (_dir, store) = store().await;
        assert_eq!(store.uri_for("ws/a.mp4"), "file://test-bucket/ws/a.mp4");
        assert!(matches!(
            store.presign_get("ws/a.mp4", Duration::from_secs(60)).await,
            Err(StorageError::Unsupported(_))
        ));
        store.check_connectivity().await.unwrap();
    }
}
