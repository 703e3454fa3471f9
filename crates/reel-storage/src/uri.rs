//! Object URIs of the form `scheme://bucket/key`.

use std::fmt;
use std::str::FromStr;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Parsed object URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUri {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectUri {
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Whether `raw` looks like a URI rather than a bare key.
    pub fn is_uri(raw: &str) -> bool {
        raw.contains("://")
    }
}

impl FromStr for ObjectUri {
    type Err = StorageError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| StorageError::invalid_key(raw))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| StorageError::invalid_key(raw))?;
        if scheme.is_empty() || bucket.is_empty() || key.is_empty() {
            return Err(StorageError::invalid_key(raw));
        }
        Ok(Self::new(scheme, bucket, key))
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

/// Resolve a URI or bare key to a key inside `store`'s bucket.
pub fn resolve_key(store: &dyn ObjectStore, reference: &str) -> StorageResult<String> {
    let reference = reference.trim();
    if !ObjectUri::is_uri(reference) {
        let key = reference.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::invalid_key(reference));
        }
        return Ok(key.to_string());
    }

    let uri: ObjectUri = reference.parse()?;
    if uri.scheme != store.scheme() || uri.bucket != store.bucket() {
        return Err(StorageError::BucketMismatch {
            uri: uri.to_string(),
            bucket: store.bucket().to_string(),
        });
    }
    Ok(uri.key)
}
