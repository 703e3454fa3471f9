//! Job identifiers, kinds and status records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::SequencedClip;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Cut a source video into fixed-duration segments
    Split,
    /// Describe segments with the AI model
    Metadata,
    /// Cut every clip listed in metadata files
    Clips,
    /// Concatenate an ordered clip list
    Join,
    /// Ask the AI model for an ordered clip list
    Sequence,
    /// Cut and join a sequenced clip list
    Trailer,
    /// Cut the scenes where given cast members appear
    FaceClips,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Split => "split",
            JobKind::Metadata => "metadata",
            JobKind::Clips => "clips",
            JobKind::Join => "join",
            JobKind::Sequence => "sequence",
            JobKind::Trailer => "trailer",
            JobKind::FaceClips => "face_clips",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a runner slot
    #[default]
    Queued,
    /// Actively being processed
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status record of one pipeline job, as exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human readable outcome, or the error message when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Object URIs written by the job
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_files: Vec<String>,
    /// Names of clips written by the job
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_clips: Vec<String>,
    /// Single output object URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_file: Option<String>,
    /// Ordered clip list proposed by the sequencer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequence: Vec<SequencedClip>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a queued record.
    pub fn new(job_id: JobId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            kind,
            status: JobStatus::Queued,
            progress: 0,
            details: None,
            generated_files: Vec::new(),
            generated_clips: Vec::new(),
            generated_file: None,
            sequence: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Update the status and bump the updated_at timestamp.
    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Update progress, clamped to 100.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
    }

    /// Replace the details message.
    pub fn set_details(&mut self, details: impl Into<String>) {
        self.details = Some(details.into());
        self.updated_at = Utc::now();
    }

    /// Mark job as completed.
    pub fn complete(&mut self, details: impl Into<String>) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.details = Some(details.into());
        self.updated_at = Utc::now();
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.details = Some(error.into());
        self.updated_at = Utc::now();
    }
}
