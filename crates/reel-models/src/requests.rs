//! Request and response bodies for the pipeline endpoints.
//!
//! Object references (`*_uri` fields) accept either a full object URI
//! (`s3://bucket/key`) or a bare key inside the configured bucket.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{JobId, JobStatus, SequencedClip};

/// Workspace names are single top-level prefixes.
pub fn validate_workspace(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(ValidationError::new("invalid_workspace"));
    }
    Ok(())
}

fn default_metadata_prefix() -> String {
    "metadata".to_string()
}

fn default_clips_prefix() -> String {
    "clips".to_string()
}

fn default_trailer_prefix() -> String {
    "trailers".to_string()
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

/// Split one source video into fixed-duration segments.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SplitVideoRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub video_uri: String,
    /// Segment length in seconds, at most one day
    #[validate(range(min = 1, max = 86400))]
    pub segment_duration: u32,
}

/// Generate AI metadata for a list of segments.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetadataRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub video_uris: Vec<String>,
    /// Prompt with `{{source_filename}}` and `{{actual_video_duration}}` placeholders
    #[validate(length(min = 1))]
    pub prompt_template: String,
    /// Model override; the configured default is used when absent
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_metadata_prefix")]
    pub output_prefix: String,
}

/// Cut every clip described in a set of metadata files.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClipGenerationRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub metadata_uris: Vec<String>,
    #[serde(default = "default_clips_prefix")]
    pub output_prefix: String,
}

/// Concatenate clips in the given order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JoinVideosRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub clip_uris: Vec<String>,
    #[serde(default = "default_clips_prefix")]
    pub output_prefix: String,
}

/// Ask the AI model for an ordered clip list.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SequenceRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub metadata_uris: Vec<String>,
    #[validate(length(min = 1))]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Cut and join an ordered clip list into one video.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrailerRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub clips: Vec<SequencedClip>,
    #[serde(default = "default_trailer_prefix")]
    pub output_prefix: String,
}

/// Cut the scenes of a video in which any of the pictured cast appear.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FaceClipRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1))]
    pub video_uri: String,
    /// Reference photos, usually uploaded to `{workspace}/temp_cast_photos/`
    #[validate(length(min = 1))]
    pub cast_photo_uris: Vec<String>,
    #[serde(default = "default_clips_prefix")]
    pub output_prefix: String,
}

/// Request a presigned upload URL for a new source video.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUploadUrlRequest {
    #[validate(custom(function = "validate_workspace"))]
    pub workspace: String,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeleteBlobRequest {
    #[validate(length(min = 1))]
    pub blob_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeleteBatchRequest {
    #[validate(length(min = 1))]
    pub blob_names: Vec<String>,
}

/// Response for every queued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: JobId,
    pub status: JobStatus,
}

impl JobAccepted {
    pub fn queued(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_validation() {
        assert!(validate_workspace("trailer-a").is_ok());
        assert!(validate_workspace("").is_err());
        assert!(validate_workspace("a/b").is_err());
        assert!(validate_workspace("..").is_err());
    }

    #[test]
    fn test_split_request_validation() {
        let req: SplitVideoRequest = serde_json::from_value(serde_json::json!({
            "workspace": "ws",
            "video_uri": "ws/uploads/movie.mp4",
            "segment_duration": 0
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req = SplitVideoRequest {
            segment_duration: 300,
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_metadata_request_defaults() {
        let req: MetadataRequest = serde_json::from_value(serde_json::json!({
            "workspace": "ws",
            "video_uris": ["ws/segments/a_part_001.mp4"],
            "prompt_template": "Describe {{source_filename}}"
        }))
        .unwrap();
        assert_eq!(req.output_prefix, "metadata");
        assert!(req.model.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_lists_rejected() {
        let req = JoinVideosRequest {
            workspace: "ws".into(),
            clip_uris: vec![],
            output_prefix: "clips".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_face_clip_request() {
        let req: FaceClipRequest = serde_json::from_value(serde_json::json!({
            "workspace": "ws",
            "video_uri": "ws/uploads/movie.mp4",
            "cast_photo_uris": []
        }))
        .unwrap();
        assert_eq!(req.output_prefix, "clips");
        assert!(req.validate().is_err());

        let req = FaceClipRequest {
            cast_photo_uris: vec!["ws/temp_cast_photos/lead.jpg".into()],
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_job_accepted_body() {
        let body = serde_json::to_value(JobAccepted::queued(JobId::from_string("j1"))).unwrap();
        assert_eq!(body, serde_json::json!({"job_id": "j1", "status": "queued"}));
    }
}
