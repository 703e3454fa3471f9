//! FFmpeg CLI wrapper for the reel pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Segment splitting, precise clip extraction and clip concatenation

pub mod clip;
pub mod command;
pub mod concat;
pub mod error;
pub mod probe;
pub mod progress;
pub mod split;
#[cfg(all(unix, any(test, feature = "test-util")))]
pub mod testing;

pub use clip::extract_clip;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::join_videos;
pub use error::{MediaError, MediaResult};
pub use probe::{get_duration, probe_video, probe_video_with, VideoInfo};
pub use progress::FfmpegProgress;
pub use split::{plan_segments, split_video, SegmentPlan, SplitOutcome};
