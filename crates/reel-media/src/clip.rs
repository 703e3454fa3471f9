//! Precise clip extraction.

use std::path::Path;

use reel_models::ClipEncoding;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Cut `[start, end)` out of `input` into `output`, re-encoding so the cut
/// lands exactly on the requested frames.
pub async fn extract_clip(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    end: f64,
) -> MediaResult<()> {
    extract_clip_with(runner, input, output, start, end, &ClipEncoding::for_clip()).await
}

/// [`extract_clip`] with explicit encoding settings.
pub async fn extract_clip_with(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    end: f64,
    encoding: &ClipEncoding,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    let cmd = build_clip_command(input, output, start, end, encoding)?;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(
        "Extracting clip: {} -> {} ({:.2}s - {:.2}s)",
        input.display(),
        output.display(),
        start,
        end
    );

    runner.run(&cmd).await?;

    if !output.exists() {
        return Err(MediaError::internal(format!(
            "FFmpeg reported success but {} was not written",
            output.display()
        )));
    }
    Ok(())
}

fn build_clip_command(
    input: &Path,
    output: &Path,
    start: f64,
    end: f64,
    encoding: &ClipEncoding,
) -> MediaResult<FfmpegCommand> {
    if start < 0.0 {
        return Err(MediaError::invalid_range("Clip start cannot be negative"));
    }
    let duration = end - start;
    if duration <= 0.0 {
        return Err(MediaError::invalid_range("Clip duration must be positive"));
    }

    Ok(FfmpegCommand::new(input, output)
        .seek(start)
        .duration(duration)
        .output_args(encoding.to_ffmpeg_args()))
}
