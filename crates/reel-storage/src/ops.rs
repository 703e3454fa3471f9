//! Workspace-level operations on top of an [`ObjectStore`].
//!
//! A workspace is a top-level prefix holding the artifacts of one project:
//! uploads, segments, metadata and clips.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Marker object that keeps an otherwise empty folder listed.
pub const FOLDER_PLACEHOLDER: &str = ".folder_placeholder";

/// Lifetime of presigned URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Source video extensions accepted for upload.
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".mkv", ".wmv", ".flv", ".webm"];

/// Reference photo extensions accepted for face-based clips.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

/// Sub-folder holding uploaded cast photos.
pub const CAST_PHOTOS_FOLDER: &str = "temp_cast_photos";

/// Sub-folders created with every workspace.
pub const WORKSPACE_FOLDERS: &[&str] = &["uploads", "segments", "metadata", "clips"];

/// Append a trailing `/` to non-empty prefixes.
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim().trim_start_matches('/');
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// Join a workspace, a sub-prefix and a file name into a key.
pub fn workspace_key(workspace: &str, prefix: &str, name: &str) -> String {
    [workspace, prefix, name]
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Last path segment of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// File name of a key without its extension.
pub fn file_stem(key: &str) -> &str {
    let name = file_name(key);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn is_placeholder(key: &str) -> bool {
    file_name(key) == FOLDER_PLACEHOLDER
}

fn has_extension(key: &str, allowed: &[&str]) -> bool {
    let lower = key.to_lowercase();
    allowed.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Whether `file_name` has an accepted video extension.
pub fn is_allowed_video(file_name: &str) -> bool {
    has_extension(file_name, VIDEO_EXTENSIONS)
}

/// Whether `file_name` has an accepted photo extension.
pub fn is_allowed_image(file_name: &str) -> bool {
    has_extension(file_name, IMAGE_EXTENSIONS)
}

/// Content type to store an object with, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Sorted file keys below `prefix`, optionally filtered by extension.
///
/// Folder placeholders and directory markers are skipped. Finding nothing
/// is reported as [`StorageError::NotFound`].
pub async fn list_files(
    store: &dyn ObjectStore,
    prefix: &str,
    allowed_extensions: &[&str],
) -> StorageResult<Vec<String>> {
    let prefix = normalize_prefix(prefix);

    let mut files: Vec<String> = store
        .list_objects(&prefix)
        .await?
        .into_iter()
        .map(|o| o.key)
        .filter(|key| !key.ends_with('/') && !is_placeholder(key))
        .filter(|key| allowed_extensions.is_empty() || has_extension(key, allowed_extensions))
        .collect();

    if files.is_empty() {
        let location = if prefix.is_empty() {
            format!("bucket '{}'", store.bucket())
        } else {
            format!("folder '{}' in bucket '{}'", prefix, store.bucket())
        };
        return Err(StorageError::not_found(format!("No files found in {}", location)));
    }

    files.sort();
    Ok(files)
}

/// Create a placeholder in `folder` if nothing is stored below it.
///
/// Returns whether a placeholder was written.
pub async fn ensure_folder_exists(store: &dyn ObjectStore, folder: &str) -> StorageResult<bool> {
    let folder = normalize_prefix(folder);
    if folder.is_empty() {
        return Ok(false);
    }

    if !store.list_objects(&folder).await?.is_empty() {
        return Ok(false);
    }

    let key = format!("{}{}", folder, FOLDER_PLACEHOLDER);
    store.upload_bytes(Vec::new(), &key, "text/plain").await?;
    info!("Created placeholder for folder {}", store.uri_for(&folder));
    Ok(true)
}

/// Names of all top-level workspaces.
pub async fn list_workspaces(store: &dyn ObjectStore) -> StorageResult<Vec<String>> {
    let mut names: Vec<String> = store
        .list_prefixes("")
        .await?
        .into_iter()
        .map(|p| p.trim_end_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .collect();
    names.sort();
    Ok(names)
}

/// Create a workspace and its standard sub-folders.
///
/// Returns the folders that were created or already existed.
pub async fn create_workspace(store: &dyn ObjectStore, name: &str) -> StorageResult<Vec<String>> {
    let name = name.trim().trim_matches('/');
    if name.is_empty() || name.contains('/') {
        return Err(StorageError::invalid_key("Workspace name must be a single non-empty segment"));
    }

    let mut folders = vec![format!("{}/", name)];
    folders.extend(WORKSPACE_FOLDERS.iter().map(|sub| format!("{}/{}/", name, sub)));

    for folder in &folders {
        ensure_folder_exists(store, folder).await?;
    }
    Ok(folders)
}

/// Key for a newly uploaded source video:
/// `{workspace}/uploads/{YYYYmmdd_HHMMSS}_{id8}_{name}` where spaces and `/`
/// in the name become `_`.
pub fn upload_object_name(workspace: &str, file_name: &str, now: DateTime<Utc>, id: Uuid) -> String {
    let safe_name = file_name.trim().replace([' ', '/'], "_");
    let id = id.simple().to_string();
    format!(
        "{}/uploads/{}_{}_{}",
        workspace.trim_matches('/'),
        now.format("%Y%m%d_%H%M%S"),
        &id[..8],
        safe_name
    )
}

/// Key for an uploaded cast photo: `{workspace}/temp_cast_photos/{name}`.
///
/// A photo uploaded under an existing name replaces the earlier one.
pub fn cast_photo_object_name(workspace: &str, file_name: &str) -> String {
    let safe_name = file_name.trim().replace([' ', '/', '\\'], "_");
    workspace_key(workspace, CAST_PHOTOS_FOLDER, &safe_name)
}

/// Outcome of a batch delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
}

/// Delete every present key, skipping missing ones.
pub async fn delete_batch(store: &dyn ObjectStore, keys: &[String]) -> StorageResult<DeleteReport> {
    let mut report = DeleteReport::default();

    for key in keys {
        if store.exists(key).await? {
            report.deleted.push(key.clone());
        } else {
            warn!("Skipping delete of missing object {}", key);
            report.missing.push(key.clone());
        }
    }

    store.delete_objects(&report.deleted).await?;
    Ok(report)
}
