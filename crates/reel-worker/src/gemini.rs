//! Gemini client for clip metadata and sequencing.
//!
//! Talks to the `generateContent` REST endpoint. Small videos travel inline
//! as base64; larger ones go through the Files API first.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async_if, RetryConfig};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_INLINE_LIMIT: u64 = 20 * 1024 * 1024;

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model used when a request names none
    pub model: String,
    /// Models tried in order after the requested one fails
    pub fallback_models: Vec<String>,
    pub api_base: String,
    /// Videos up to this size are sent inline
    pub inline_limit_bytes: u64,
    pub retry: RetryConfig,
    pub file_poll_interval: Duration,
    pub file_poll_attempts: u32,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            fallback_models: Vec::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            inline_limit_bytes: DEFAULT_INLINE_LIMIT,
            retry: RetryConfig::new("gemini_generate"),
            file_poll_interval: Duration::from_secs(5),
            file_poll_attempts: 60,
            request_timeout: Duration::from_secs(600),
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            fallback_models: std::env::var("GEMINI_FALLBACK_MODELS")
                .map(|s| {
                    s.split(',')
                        .map(|m| m.trim().to_string())
                        .filter(|m| !m.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            api_base: std::env::var("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            inline_limit_bytes: std::env::var("GEMINI_INLINE_LIMIT_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.inline_limit_bytes),
            ..defaults
        }
    }

    /// Requested model first, then the fallbacks, without duplicates.
    pub fn models_for(&self, requested: Option<&str>) -> Vec<String> {
        let first = requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.model);

        let mut models = vec![first.to_string()];
        for model in std::iter::once(&self.model).chain(&self.fallback_models) {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> WorkerResult<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            warn!("Prompt blocked by AI endpoint: {}", reason);
            return Err(WorkerError::AiEmpty);
        }

        let candidate = self.candidates.into_iter().next().ok_or(WorkerError::AiEmpty)?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = candidate.finish_reason {
                warn!("AI response empty, finish reason {}", reason);
            }
            return Err(WorkerError::AiEmpty);
        }
        Ok(text)
    }
}

/// File resource returned by the Files API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    uri: String,
    #[serde(default)]
    state: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

/// Gemini API client.
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    /// Create a client; an empty API key is a configuration error.
    pub fn new(config: GeminiConfig) -> WorkerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(WorkerError::config_error("GEMINI_API_KEY not set"));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> WorkerResult<Self> {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Describe a video with a JSON response constrained by `schema`.
    ///
    /// Returns the raw response text.
    pub async fn generate_json_for_video(
        &self,
        prompt: &str,
        video: &Path,
        schema: &Value,
        model: Option<&str>,
    ) -> WorkerResult<String> {
        let size = tokio::fs::metadata(video).await?.len();
        let mime_type = video_mime_type(video);

        let (video_part, remote) = if size <= self.config.inline_limit_bytes {
            debug!("Sending {} ({} bytes) inline", video.display(), size);
            let data = tokio::fs::read(video).await?;
            let part = Part::Inline {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                },
            };
            (part, None)
        } else {
            let file = self.upload_file(video, &mime_type, size).await?;
            let part = Part::File {
                file_data: FileData {
                    mime_type: file.mime_type.clone().unwrap_or(mime_type.clone()),
                    file_uri: file.uri.clone(),
                },
            };
            (part, Some(file))
        };

        let generation_config = || GenerationConfig {
            response_mime_type: "application/json",
            response_schema: schema.clone(),
            temperature: 1.0,
            top_p: 1.0,
            max_output_tokens: 10_000,
        };
        let result = self
            .generate_with_fallback(model, || GenerateRequest {
                contents: vec![Content {
                    role: "user",
                    parts: vec![
                        Part::Text {
                            text: prompt.to_string(),
                        },
                        video_part.clone(),
                    ],
                }],
                generation_config: Some(generation_config()),
                safety_settings: block_none_safety(),
            })
            .await;

        if let Some(file) = remote {
            if let Err(e) = self.delete_file(&file.name).await {
                warn!("Failed to delete uploaded file {}: {}", file.name, e);
            }
        }

        result
    }

    /// Plain text generation.
    pub async fn generate_text(&self, prompt: &str, model: Option<&str>) -> WorkerResult<String> {
        self.generate_with_fallback(model, || GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: None,
            safety_settings: Vec::new(),
        })
        .await
    }

    async fn generate_with_fallback<B>(&self, model: Option<&str>, build: B) -> WorkerResult<String>
    where
        B: Fn() -> GenerateRequest,
    {
        let mut last_error = None;

        for model in self.config.models_for(model) {
            info!("Calling AI model {}", model);
            let request = build();
            let result = retry_async_if(
                &self.config.retry,
                || self.generate_once(&model, &request),
                WorkerError::is_retryable,
            )
            .await;

            match result {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("AI model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WorkerError::ai_failed("No AI models configured")))
    }

    async fn generate_once(&self, model: &str, request: &GenerateRequest) -> WorkerResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.config.api_key)])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::AiHttp {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json().await?;
        body.into_text()
    }

    /// Upload through the resumable Files API and wait until it is usable.
    async fn upload_file(&self, path: &Path, mime_type: &str, size: u64) -> WorkerResult<RemoteFile> {
        let base = self.config.api_base.trim_end_matches('/');
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());

        info!("Uploading {} ({} bytes) to the Files API", display_name, size);

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", base))
            .query(&[("key", &self.config.api_key)])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;

        let start = error_for_status(start).await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| WorkerError::ai_failed("Files API did not return an upload URL"))?;

        let file = tokio::fs::File::open(path).await?;
        let uploaded = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(reqwest::header::CONTENT_LENGTH, size.to_string())
            .body(file)
            .send()
            .await?;

        let uploaded: UploadResponse = error_for_status(uploaded).await?.json().await?;
        self.wait_until_active(uploaded.file).await
    }

    async fn wait_until_active(&self, mut file: RemoteFile) -> WorkerResult<RemoteFile> {
        let url = format!(
            "{}/v1beta/{}",
            self.config.api_base.trim_end_matches('/'),
            file.name
        );

        for _ in 0..self.config.file_poll_attempts {
            match file.state.as_str() {
                "ACTIVE" => return Ok(file),
                "FAILED" => {
                    return Err(WorkerError::ai_failed(format!(
                        "File processing failed for {}",
                        file.name
                    )))
                }
                state => debug!("File {} is {}, waiting", file.name, state),
            }

            tokio::time::sleep(self.config.file_poll_interval).await;
            let response = self
                .client
                .get(&url)
                .query(&[("key", &self.config.api_key)])
                .send()
                .await?;
            file = error_for_status(response).await?.json().await?;
        }

        Err(WorkerError::ai_failed(format!(
            "File {} did not become active in time",
            file.name
        )))
    }

    async fn delete_file(&self, name: &str) -> WorkerResult<()> {
        let url = format!("{}/v1beta/{}", self.config.api_base.trim_end_matches('/'), name);
        let response = self
            .client
            .delete(&url)
            .query(&[("key", &self.config.api_key)])
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }
}

async fn error_for_status(response: reqwest::Response) -> WorkerResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WorkerError::AiHttp {
        status: status.as_u16(),
        body,
    })
}

fn block_none_safety() -> Vec<SafetySetting> {
    SAFETY_CATEGORIES
        .iter()
        .map(|&category| SafetySetting {
            category,
            threshold: "BLOCK_NONE",
        })
        .collect()
}

fn video_mime_type(path: &Path) -> String {
    let name = path.to_string_lossy();
    match reel_storage::ops::content_type_for(&name) {
        "application/octet-stream" => "video/mp4".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".to_string(),
            model: "primary".to_string(),
            fallback_models: vec!["backup".to_string()],
            api_base: server.uri(),
            retry: RetryConfig::new("test")
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(1)),
            file_poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn text_response(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[test]
    fn test_models_for() {
        let config = GeminiConfig {
            model: "a".to_string(),
            fallback_models: vec!["b".to_string(), "a".to_string()],
            ..Default::default()
        };
        assert_eq!(config.models_for(None), vec!["a", "b"]);
        assert_eq!(config.models_for(Some("c")), vec!["c", "a", "b"]);
        assert_eq!(config.models_for(Some(" ")), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_api_key() {
        let result = GeminiClient::new(GeminiConfig::default());
        assert!(matches!(result, Err(WorkerError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_generate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(text_response("hello"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server)).unwrap();
        assert_eq!(client.generate_text("hi", None).await.unwrap(), "hello");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query().unwrap_or("").contains("key=test-key"));
    }

    #[tokio::test]
    async fn test_falls_back_after_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/backup:generateContent"))
            .respond_with(text_response("from backup"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server)).unwrap();
        assert_eq!(client.generate_text("hi", None).await.unwrap(), "from backup");
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(text_response("recovered"))
            .with_priority(2)
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server)).unwrap();
        assert_eq!(client.generate_text("hi", None).await.unwrap(), "recovered");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_response_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(test_config(&server)).unwrap();
        let err = client.generate_text("hi", None).await.unwrap_err();
        assert!(matches!(err, WorkerError::AiEmpty));
        assert_eq!(err.to_string(), "AI response was empty or blocked");
    }

    #[tokio::test]
    async fn test_inline_video_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(text_response("[]"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("seg.mp4");
        tokio::fs::write(&video, b"fake video").await.unwrap();

        let client = GeminiClient::new(test_config(&server)).unwrap();
        let schema = serde_json::json!({ "type": "ARRAY" });
        let text = client
            .generate_json_for_video("describe", &video, &schema, None)
            .await
            .unwrap();
        assert_eq!(text, "[]");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "video/mp4");
        assert_eq!(parts[1]["inlineData"]["data"], BASE64.encode(b"fake video"));

        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "ARRAY");
        assert_eq!(config["maxOutputTokens"], 10_000);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[tokio::test]
    async fn test_large_video_uses_files_api() {
        let server = MockServer::start().await;
        let upload_url = format!("{}/upload-session/1", server.uri());

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-goog-upload-url", upload_url.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload-session/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file": { "name": "files/abc", "uri": "https://files/abc", "state": "PROCESSING", "mimeType": "video/mp4" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "files/abc", "uri": "https://files/abc", "state": "ACTIVE", "mimeType": "video/mp4"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(text_response("[]"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1beta/files/abc"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("big.mp4");
        tokio::fs::write(&video, vec![0u8; 64]).await.unwrap();

        let mut config = test_config(&server);
        config.inline_limit_bytes = 16;
        let client = GeminiClient::new(config).unwrap();
        client
            .generate_json_for_video("describe", &video, &serde_json::json!({}), None)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let generate = requests
            .iter()
            .find(|r| r.url.path().ends_with(":generateContent"))
            .unwrap();
        let body: Value = serde_json::from_slice(&generate.body).unwrap();
        assert_eq!(body["contents"][0]["parts"][1]["fileData"]["fileUri"], "https://files/abc");
    }
}
