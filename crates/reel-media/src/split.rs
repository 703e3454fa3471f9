//! Fixed-duration segment splitting.
//!
//! Each segment is first cut with a stream copy. Sources whose keyframes or
//! timestamps defeat the copy are re-encoded for that segment only.

use std::path::{Path, PathBuf};

use reel_models::ClipEncoding;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Segments shorter than this are rounding leftovers and are not written.
const MIN_SEGMENT_SECS: f64 = 0.05;

/// One planned segment of a source video.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    /// Zero-based position
    pub index: usize,
    /// Start offset in seconds
    pub start: f64,
    /// Length in seconds
    pub duration: f64,
    /// Output file name, `{stem}_part_{NNN}{ext}`
    pub file_name: String,
}

/// Result of a split, possibly partial.
#[derive(Debug)]
pub struct SplitOutcome {
    /// Segments written, in order
    pub segments: Vec<PathBuf>,
    /// Number of segments planned
    pub planned: usize,
    /// Error that stopped the split early
    pub error: Option<MediaError>,
}

impl SplitOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.segments.len() == self.planned
    }
}

/// Plan the segments of a `total`-second video cut every `segment_len`
/// seconds.
///
/// `ext` includes the leading dot.
pub fn plan_segments(total: f64, segment_len: f64, stem: &str, ext: &str) -> Vec<SegmentPlan> {
    if total <= 0.0 || segment_len <= 0.0 {
        return Vec::new();
    }

    let count = (total / segment_len).ceil() as usize;
    (0..count)
        .filter_map(|index| {
            let start = index as f64 * segment_len;
            let duration = segment_len.min(total - start);
            (duration >= MIN_SEGMENT_SECS).then(|| SegmentPlan {
                index,
                start,
                duration,
                file_name: format!("{}_part_{:03}{}", stem, index + 1, ext),
            })
        })
        .collect()
}

fn stem_and_ext(input: &Path) -> (String, String) {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| ".mp4".to_string());
    (stem, ext)
}

/// Split `input` into `segment_len`-second segments inside `output_dir`.
///
/// Probing errors and non-positive durations fail the call. Once cutting
/// starts, a segment that fails both the copy and the re-encode stops the
/// split and is reported through [`SplitOutcome::error`] alongside the
/// segments already written.
pub async fn split_video<F>(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    segment_len: f64,
    on_progress: F,
) -> MediaResult<SplitOutcome>
where
    F: Fn(usize, usize) + Send + Sync,
{
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    if segment_len <= 0.0 {
        return Err(MediaError::invalid_range("Segment duration must be positive"));
    }

    let total = runner.duration(input).await?;
    if total <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "Could not determine a positive duration for {}",
            input.display()
        )));
    }

    tokio::fs::create_dir_all(output_dir).await?;

    let (stem, ext) = stem_and_ext(input);
    let plan = plan_segments(total, segment_len, &stem, &ext);
    let planned = plan.len();

    info!(
        "Splitting {} ({:.2}s) into {} segments of {:.0}s",
        input.display(),
        total,
        planned,
        segment_len
    );

    let mut segments = Vec::with_capacity(planned);
    on_progress(0, planned);

    for segment in &plan {
        let output = output_dir.join(&segment.file_name);
        match cut_segment(runner, input, &output, segment).await {
            Ok(()) => {
                segments.push(output);
                on_progress(segments.len(), planned);
            }
            Err(e) => {
                warn!("Segment {} failed, stopping split: {}", segment.file_name, e);
                let _ = tokio::fs::remove_file(&output).await;
                return Ok(SplitOutcome {
                    segments,
                    planned,
                    error: Some(e),
                });
            }
        }
    }

    info!("Split complete: {} segments", segments.len());
    Ok(SplitOutcome {
        segments,
        planned,
        error: None,
    })
}

async fn cut_segment(
    runner: &FfmpegRunner,
    input: &Path,
    output: &Path,
    segment: &SegmentPlan,
) -> MediaResult<()> {
    let copy = FfmpegCommand::new(input, output)
        .seek(segment.start)
        .duration(segment.duration)
        .codec_copy()
        .output_args(["-avoid_negative_ts", "1"]);

    match runner.run(&copy).await {
        Ok(()) => return Ok(()),
        Err(e @ (MediaError::Cancelled | MediaError::FfmpegNotFound | MediaError::Timeout(_))) => {
            return Err(e)
        }
        Err(e) => warn!(
            "Stream copy failed for {}, re-encoding: {}",
            segment.file_name, e
        ),
    }

    let encode = FfmpegCommand::new(input, output)
        .seek(segment.start)
        .duration(segment.duration)
        .output_args(ClipEncoding::for_segment_fallback().to_ffmpeg_args());

    runner.run(&encode).await
}
