//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("AI request failed: {0}")]
    AiFailed(String),

    #[error("AI request failed with status {status}: {body}")]
    AiHttp { status: u16, body: String },

    #[error("AI response was empty or blocked")]
    AiEmpty,

    #[error("Face recognition service failed with status {status}: {body}")]
    FaceService { status: u16, body: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] reel_models::MetadataError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn ai_failed(msg: impl Into<String>) -> Self {
        Self::AiFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is worth retrying against the same endpoint.
    ///
    /// Rate limits, server errors and transport failures are transient;
    /// client errors and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::AiHttp { status, .. } => *status == 429 || *status >= 500,
            WorkerError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Cancellation from shutdown, either direct or surfaced by FFmpeg.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkerError::Cancelled | WorkerError::Media(reel_media::MediaError::Cancelled)
        )
    }
}
