//! Workspace and object storage handlers.

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use reel_models::requests::validate_workspace;
use reel_models::{CreateUploadUrlRequest, DeleteBatchRequest, DeleteBlobRequest};
use reel_storage::ops::{self, DeleteReport, IMAGE_EXTENSIONS, SIGNED_URL_TTL, VIDEO_EXTENSIONS};
use reel_storage::resolve_key;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct WorkspacesResponse {
    pub workspaces: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct CreateWorkspaceResponse {
    pub message: String,
    pub folders: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub prefix: String,
    /// Comma separated, with or without the leading dot
    #[serde(default)]
    pub extensions: Option<String>,
}

#[derive(Serialize)]
pub struct FilesResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    pub blob_name: String,
}

#[derive(Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Serialize)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub blob_name: String,
    pub uri: String,
    pub expires_in: u64,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub bucket: String,
    pub blob_name: String,
    pub uri: String,
    pub workspace: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct DeleteBatchResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: DeleteReport,
}

/// List workspaces.
pub async fn list_workspaces(State(state): State<AppState>) -> ApiResult<Json<WorkspacesResponse>> {
    let workspaces = ops::list_workspaces(state.store.as_ref()).await?;
    Ok(Json(WorkspacesResponse { workspaces }))
}

/// Create a workspace with its standard folders.
pub async fn create_workspace(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkspaceRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_workspace(&request.name)
        .map_err(|_| ApiError::bad_request("Workspace name must be a single non-empty segment"))?;

    let name = request.name.trim();
    let folders = ops::create_workspace(state.store.as_ref(), name).await?;
    info!("Created workspace {}", name);

    Ok((
        StatusCode::CREATED,
        Json(CreateWorkspaceResponse {
            message: format!("Workspace '{}' created successfully.", name),
            folders,
        }),
    ))
}

fn parse_extensions(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|e| {
                if e.starts_with('.') {
                    e.to_lowercase()
                } else {
                    format!(".{}", e.to_lowercase())
                }
            })
            .collect()
    })
    .unwrap_or_default()
}

/// List files below a prefix.
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<FilesResponse>> {
    let extensions = parse_extensions(query.extensions.as_deref());
    let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();

    let files = ops::list_files(state.store.as_ref(), &query.prefix, &extensions).await?;
    Ok(Json(FilesResponse { files }))
}

/// Presigned GET URL for an existing object.
pub async fn signed_url(
    State(state): State<AppState>,
    Query(query): Query<SignedUrlQuery>,
) -> ApiResult<Json<SignedUrlResponse>> {
    let key = resolve_key(state.store.as_ref(), &query.blob_name)?;
    if !state.store.exists(&key).await? {
        return Err(ApiError::not_found("File not found"));
    }

    let url = state.store.presign_get(&key, SIGNED_URL_TTL).await?;
    Ok(Json(SignedUrlResponse {
        url,
        expires_in: SIGNED_URL_TTL.as_secs(),
    }))
}

/// Stream an object with a content type derived from the key.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let key = resolve_key(state.store.as_ref(), &key)?;
    let body = state.store.download_stream(&key).await?;
    let disposition = format!("inline; filename=\"{}\"", ops::file_name(&key));

    Ok((
        [
            (header::CONTENT_TYPE, ops::content_type_for(&key).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(body),
    ))
}

/// Delete a single object.
pub async fn delete_blob(
    State(state): State<AppState>,
    Json(request): Json<DeleteBlobRequest>,
) -> ApiResult<Json<MessageResponse>> {
    request.validate()?;

    let key = resolve_key(state.store.as_ref(), &request.blob_name)?;
    if !state.store.exists(&key).await? {
        return Err(ApiError::not_found(format!("Blob '{}' not found", request.blob_name)));
    }

    state.store.delete_object(&key).await?;
    info!("Deleted {}", state.store.uri_for(&key));

    Ok(Json(MessageResponse {
        message: format!("Blob '{}' deleted successfully.", request.blob_name),
    }))
}

/// Delete several objects, skipping missing ones.
pub async fn delete_batch(
    State(state): State<AppState>,
    Json(request): Json<DeleteBatchRequest>,
) -> ApiResult<Json<DeleteBatchResponse>> {
    request.validate()?;

    let keys = request
        .blob_names
        .iter()
        .map(|name| resolve_key(state.store.as_ref(), name))
        .collect::<Result<Vec<_>, _>>()?;

    let report = ops::delete_batch(state.store.as_ref(), &keys).await?;
    Ok(Json(DeleteBatchResponse {
        message: format!(
            "Deleted {} of {} objects in bucket '{}'.",
            report.deleted.len(),
            keys.len(),
            state.store.bucket()
        ),
        report,
    }))
}

fn unsupported_extension(file_name: &str, allowed: &[&str]) -> ApiError {
    ApiError::bad_request(format!(
        "File type of '{}' not supported. Allowed: {}",
        file_name,
        allowed.join(", ")
    ))
}

/// Presigned PUT URL for a new source video.
pub async fn generate_upload_url(
    State(state): State<AppState>,
    Json(request): Json<CreateUploadUrlRequest>,
) -> ApiResult<Json<UploadUrlResponse>> {
    request.validate()?;
    if !ops::is_allowed_video(&request.file_name) {
        return Err(unsupported_extension(&request.file_name, VIDEO_EXTENSIONS));
    }

    let key = ops::upload_object_name(&request.workspace, &request.file_name, Utc::now(), Uuid::new_v4());
    let upload_url = state
        .store
        .presign_put(&key, &request.content_type, SIGNED_URL_TTL)
        .await?;

    Ok(Json(UploadUrlResponse {
        upload_url,
        uri: state.store.uri_for(&key),
        blob_name: key,
        expires_in: SIGNED_URL_TTL.as_secs(),
    }))
}

/// A multipart upload spooled to a temporary file.
struct SpooledUpload {
    workspace: String,
    file_name: String,
    path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

/// Read a `workspace` text field and one file field named in `file_fields`.
///
/// The file is streamed to a temporary file; names failing `allowed` are
/// rejected before any bytes are written.
async fn spool_upload(
    mut multipart: Multipart,
    file_fields: &[&str],
    allowed: fn(&str) -> bool,
    allowed_list: &[&str],
) -> ApiResult<SpooledUpload> {
    let dir = tempfile::tempdir().map_err(|e| ApiError::internal(e.to_string()))?;
    let path = dir.path().join("upload");

    let mut workspace: Option<String> = None;
    let mut file_name: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("workspace") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                workspace = Some(value.trim().to_string());
            }
            Some(field_name) if file_fields.contains(&field_name) => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("File field has no file name"))?;
                if !allowed(&name) {
                    return Err(unsupported_extension(&name, allowed_list));
                }

                let mut file = tokio::fs::File::create(&path)
                    .await
                    .map_err(|e| ApiError::internal(e.to_string()))?;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Upload interrupted: {}", e)))?
                {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| ApiError::internal(e.to_string()))?;
                }
                file.flush().await.map_err(|e| ApiError::internal(e.to_string()))?;
                file_name = Some(name);
            }
            _ => {}
        }
    }

    let workspace = workspace.ok_or_else(|| ApiError::bad_request("Missing 'workspace' field"))?;
    validate_workspace(&workspace)
        .map_err(|_| ApiError::bad_request("Workspace name must be a single non-empty segment"))?;
    let file_name = file_name.ok_or_else(|| {
        ApiError::bad_request(format!("Missing '{}' field", file_fields.join("' or '")))
    })?;

    Ok(SpooledUpload {
        workspace,
        file_name,
        path,
        _dir: dir,
    })
}

async fn store_upload(state: &AppState, upload: SpooledUpload, key: String) -> ApiResult<UploadResponse> {
    state
        .store
        .upload_file(&upload.path, &key, ops::content_type_for(&key))
        .await?;
    info!("Uploaded {} to {}", upload.file_name, state.store.uri_for(&key));

    Ok(UploadResponse {
        bucket: state.store.bucket().to_string(),
        uri: state.store.uri_for(&key),
        blob_name: key,
        workspace: upload.workspace,
    })
}

/// Multipart upload of a source video into `{workspace}/uploads/`.
///
/// Expects a `workspace` text field and a `file` field.
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let upload = spool_upload(multipart, &["file"], ops::is_allowed_video, VIDEO_EXTENSIONS).await?;
    let key = ops::upload_object_name(&upload.workspace, &upload.file_name, Utc::now(), Uuid::new_v4());
    Ok(Json(store_upload(&state, upload, key).await?))
}

/// Multipart upload of a cast member photo into `{workspace}/temp_cast_photos/`.
///
/// Expects a `workspace` text field and a `photo_file` (or `file`) field.
pub async fn upload_cast_photo(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let upload = spool_upload(
        multipart,
        &["photo_file", "file"],
        ops::is_allowed_image,
        IMAGE_EXTENSIONS,
    )
    .await?;
    let key = ops::cast_photo_object_name(&upload.workspace, &upload.file_name);
    Ok(Json(store_upload(&state, upload, key).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extensions() {
        assert_eq!(parse_extensions(Some("mp4, .MOV,,")), vec![".mp4", ".mov"]);
        assert!(parse_extensions(None).is_empty());
    }
}
