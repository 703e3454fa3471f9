//! Pipeline job runner.
//!
//! This crate provides:
//! - The Gemini client used for clip metadata and sequencing
//! - A client for the face recognition service
//! - Job implementations for splitting, metadata, clips, joining,
//!   sequencing, trailers and face-based clips
//! - An in-memory job store and a bounded background runner

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod face;
pub mod gemini;
pub mod jobs;
pub mod logging;
pub mod prompt;
pub mod retry;
pub mod sequencer;
pub mod tasks;

pub use config::WorkerConfig;
pub use context::JobContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobRunner, JobSpec};
pub use face::{FaceClient, FaceServiceConfig};
pub use gemini::{GeminiClient, GeminiConfig};
pub use jobs::JobStore;
pub use logging::JobLogger;
pub use tasks::JobOutcome;
