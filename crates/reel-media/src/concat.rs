//! Clip concatenation through FFmpeg's concat demuxer.

use std::path::{Path, PathBuf};

use reel_models::ClipEncoding;
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Quote a path for a concat list line.
fn concat_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Render the concat list for already-absolute clip paths.
pub fn concat_list(clips: &[PathBuf]) -> String {
    let mut list = clips
        .iter()
        .map(|clip| concat_line(clip))
        .collect::<Vec<_>>()
        .join("\n");
    list.push('\n');
    list
}

/// Concatenate `clips` in order into `output`.
///
/// Streams are copied when the clips share codecs and layout, as clips
/// produced by [`crate::extract_clip`] do. If the copy fails the join is
/// re-encoded to H.264/AAC.
pub async fn join_videos(
    runner: &FfmpegRunner,
    clips: &[PathBuf],
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let output = output.as_ref();

    if clips.is_empty() {
        return Err(MediaError::NoClips);
    }

    let mut absolute = Vec::with_capacity(clips.len());
    for clip in clips {
        let path = tokio::fs::canonicalize(clip)
            .await
            .map_err(|_| MediaError::FileNotFound(clip.clone()))?;
        absolute.push(path);
    }

    let list_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&list_dir).await?;

    // Removed when dropped
    let list_file = tempfile::Builder::new()
        .prefix("concat_")
        .suffix(".txt")
        .tempfile_in(&list_dir)?;
    tokio::fs::write(list_file.path(), concat_list(&absolute)).await?;

    info!("Joining {} clips into {}", absolute.len(), output.display());

    let concat = FfmpegCommand::new(list_file.path(), output)
        .input_format("concat")
        .input_args(["-safe", "0"]);

    let copy = concat.clone().codec_copy().output_args(["-vsync", "vfr"]);
    match runner.run(&copy).await {
        Ok(()) => return Ok(()),
        Err(e @ (MediaError::Cancelled | MediaError::FfmpegNotFound | MediaError::Timeout(_))) => {
            return Err(e)
        }
        Err(e) => warn!("Stream copy join failed for {}, re-encoding: {}", output.display(), e),
    }

    let encode = concat.output_args(ClipEncoding::for_clip().to_ffmpeg_args());
    runner.run(&encode).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_list_escaping() {
        let list = concat_list(&[
            PathBuf::from("/work/a.mp4"),
            PathBuf::from("/work/director's cut.mp4"),
        ]);
        assert_eq!(
            list,
            "file '/work/a.mp4'\nfile '/work/director'\\''s cut.mp4'\n"
        );
    }

    #[tokio::test]
    async fn test_join_empty_list() {
        let result = join_videos(&FfmpegRunner::new(), &[], "out.mp4").await;
        assert!(matches!(result, Err(MediaError::NoClips)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_join_falls_back_to_reencode() {
        use crate::testing::FakeMedia;

        let dir = tempfile::tempdir().unwrap();
        let clips: Vec<PathBuf> = ["a.mp4", "b.mp4"].iter().map(|n| dir.path().join(n)).collect();
        for clip in &clips {
            std::fs::write(clip, b"clip").unwrap();
        }

        let runner = FakeMedia::new(4.0)
            .fail_when("-c copy")
            .install(&dir.path().join("bin"))
            .unwrap();
        let output = dir.path().join("joined.mp4");
        join_videos(&runner, &clips, &output).await.unwrap();
        assert!(output.exists());

        let failing = FakeMedia::new(4.0)
            .fail_when("concat")
            .install(&dir.path().join("bin_failing"))
            .unwrap();
        let result = join_videos(&failing, &clips, dir.path().join("never.mp4")).await;
        assert!(matches!(result, Err(MediaError::FfmpegFailed { .. })));
    }

    #[tokio::test]
    async fn test_join_missing_clip() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let result = join_videos(&FfmpegRunner::new(), &[missing], dir.path().join("out.mp4")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
