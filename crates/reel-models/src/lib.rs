//! Shared data models for the reel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job kinds and job status records
//! - AI-generated clip metadata and its response schema
//! - Timestamp and time range parsing
//! - Ordered clip sequences
//! - Clip encoding settings
//! - Request bodies for the pipeline endpoints

pub mod encoding;
pub mod job;
pub mod metadata;
pub mod requests;
pub mod sequence;
pub mod timestamp;

// Re-export common types
pub use encoding::ClipEncoding;
pub use job::{JobId, JobKind, JobRecord, JobStatus};
pub use metadata::{parse_metadata_document, strip_code_fences, MetadataError, TrailerClipMetadata};
pub use requests::{
    ClipGenerationRequest, CreateUploadUrlRequest, DeleteBatchRequest, DeleteBlobRequest,
    FaceClipRequest, JoinVideosRequest, JobAccepted, MetadataRequest, SequenceRequest, SplitVideoRequest,
    TrailerRequest,
};
pub use sequence::SequencedClip;
pub use timestamp::{format_hms, parse_timestamp, TimeRange, TimestampError};
