//! Scripted FFmpeg/FFprobe stand-ins for tests.
//!
//! The fake `ffmpeg` writes a small file at its last argument, the output
//! path, unless its command line matches a failure pattern. The fake
//! `ffprobe` reports a fixed duration for any input.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::command::FfmpegRunner;

/// Builder for a pair of fake media binaries.
#[derive(Debug, Clone)]
pub struct FakeMedia {
    duration: f64,
    failures: Vec<String>,
    delay_secs: Option<f64>,
}

impl FakeMedia {
    /// Fake tools reporting `duration` seconds for every input.
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            failures: Vec::new(),
            delay_secs: None,
        }
    }

    /// Make `ffmpeg` exit with status 1 when its arguments contain `pattern`.
    pub fn fail_when(mut self, pattern: impl Into<String>) -> Self {
        self.failures.push(pattern.into());
        self
    }

    /// Make every `ffmpeg` run take `secs` seconds.
    pub fn delay(mut self, secs: f64) -> Self {
        self.delay_secs = Some(secs);
        self
    }

    fn ffmpeg_script(&self) -> String {
        let mut script = String::from("#!/bin/sh\n");
        if let Some(secs) = self.delay_secs {
            script.push_str(&format!("sleep {}\n", secs));
        }
        if !self.failures.is_empty() {
            script.push_str("case \"$*\" in\n");
            for pattern in &self.failures {
                script.push_str(&format!(
                    "  *\"{}\"*) echo \"fake ffmpeg failure\" >&2; exit 1 ;;\n",
                    pattern
                ));
            }
            script.push_str("esac\n");
        }
        script.push_str("for out in \"$@\"; do :; done\n");
        script.push_str("printf 'fake video' > \"$out\"\n");
        script
    }

    fn ffprobe_script(&self) -> String {
        format!(
            "#!/bin/sh\necho '{{\"format\":{{\"duration\":\"{}\"}},\"streams\":[{{\"codec_type\":\"video\",\"codec_name\":\"h264\",\"width\":1280,\"height\":720,\"avg_frame_rate\":\"25/1\"}},{{\"codec_type\":\"audio\"}}]}}'\n",
            self.duration
        )
    }

    /// Write both scripts into `dir` and return a runner that uses them.
    pub fn install(&self, dir: &Path) -> std::io::Result<FfmpegRunner> {
        std::fs::create_dir_all(dir)?;
        let ffmpeg = dir.join("ffmpeg");
        let ffprobe = dir.join("ffprobe");
        write_executable(&ffmpeg, &self.ffmpeg_script())?;
        write_executable(&ffprobe, &self.ffprobe_script())?;
        Ok(FfmpegRunner::new().with_binaries(Some(ffmpeg), Some(ffprobe)))
    }
}

fn write_executable(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_tools_report_duration_and_write_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeMedia::new(12.5).install(dir.path()).unwrap();

        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();
        assert_eq!(runner.duration(&input).await.unwrap(), 12.5);

        let output = dir.path().join("out.mp4");
        let cmd = crate::FfmpegCommand::new(&input, &output).codec_copy();
        runner.run(&cmd).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"fake video");
    }
}
