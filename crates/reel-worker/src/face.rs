//! Client for the face recognition service.
//!
//! The service fetches a video and reference photos from the bucket by key
//! and answers with the time ranges in which any of the pictured faces
//! appear.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Face recognition service configuration.
#[derive(Debug, Clone)]
pub struct FaceServiceConfig {
    /// Service root, e.g. `http://face-recognition-service:8001`
    pub base_url: String,
    /// Scanning a whole video is slow
    pub request_timeout: Duration,
}

impl FaceServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(1800),
        }
    }

    /// `None` unless `FACE_RECOGNITION_SERVICE_URL` is set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FACE_RECOGNITION_SERVICE_URL").ok()?;
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return None;
        }

        let mut config = Self::new(base_url);
        if let Some(secs) = std::env::var("FACE_RECOGNITION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        Some(config)
    }
}

// Field names are the service's wire contract.
#[derive(Debug, Serialize)]
struct ProcessVideoRequest<'a> {
    gcs_bucket: &'a str,
    gcs_video_uri: &'a str,
    gcs_cast_photo_uris: &'a [String],
}

/// A stretch of video in which a known face was seen, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FaceScene {
    pub start_time: f64,
    pub end_time: f64,
}

/// HTTP client for `POST /process-video/`.
#[derive(Debug, Clone)]
pub struct FaceClient {
    config: FaceServiceConfig,
    client: Client,
}

impl FaceClient {
    pub fn new(config: FaceServiceConfig) -> WorkerResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Scenes of `video_key` showing any face from `photo_keys`.
    pub async fn find_scenes(
        &self,
        bucket: &str,
        video_key: &str,
        photo_keys: &[String],
    ) -> WorkerResult<Vec<FaceScene>> {
        let url = format!("{}/process-video/", self.config.base_url.trim_end_matches('/'));
        debug!("Requesting face scenes for {} from {}", video_key, url);

        let response = self
            .client
            .post(&url)
            .json(&ProcessVideoRequest {
                gcs_bucket: bucket,
                gcs_video_uri: video_key,
                gcs_cast_photo_uris: photo_keys,
            })
            .send()
            .await
            .map_err(|e| {
                WorkerError::job_failed(format!(
                    "Failed to connect to face recognition service: {}",
                    e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::FaceService {
                status: status.as_u16(),
                body,
            });
        }

        let scenes: Vec<FaceScene> = response.json().await?;
        info!("Face recognition found {} scene(s) in {}", scenes.len(), video_key);
        Ok(scenes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_find_scenes_posts_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process-video/"))
            .and(body_json(serde_json::json!({
                "gcs_bucket": "test-bucket",
                "gcs_video_uri": "ws/uploads/movie.mp4",
                "gcs_cast_photo_uris": ["ws/temp_cast_photos/lead.jpg"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "start_time": 1.5, "end_time": 4.0 },
                { "start_time": 10.0, "end_time": 12.25 }
            ])))
            .mount(&server)
            .await;

        let client = FaceClient::new(FaceServiceConfig::new(format!("{}/", server.uri()))).unwrap();
        let scenes = client
            .find_scenes(
                "test-bucket",
                "ws/uploads/movie.mp4",
                &["ws/temp_cast_photos/lead.jpg".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(
            scenes,
            vec![
                FaceScene { start_time: 1.5, end_time: 4.0 },
                FaceScene { start_time: 10.0, end_time: 12.25 }
            ]
        );
    }

    #[tokio::test]
    async fn test_service_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("No valid faces found in the provided photos."),
            )
            .mount(&server)
            .await;

        let client = FaceClient::new(FaceServiceConfig::new(server.uri())).unwrap();
        let err = client
            .find_scenes("b", "ws/uploads/movie.mp4", &["ws/temp_cast_photos/x.jpg".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::FaceService { status: 400, ref body } if body.contains("No valid faces")));
    }
}
