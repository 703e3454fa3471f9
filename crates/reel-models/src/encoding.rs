//! Re-encode settings for clips and segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset for clips
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor) for clips
pub const DEFAULT_CRF: u8 = 23;

/// Encoding configuration used whenever a stream copy is not enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipEncoding {
    /// Video codec
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset; `None` leaves the encoder default
    #[serde(default = "default_preset")]
    pub preset: Option<String>,

    /// Constant Rate Factor; `None` leaves the encoder default
    #[serde(default = "default_crf")]
    pub crf: Option<u8>,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> Option<String> {
    Some(DEFAULT_PRESET.to_string())
}
fn default_crf() -> Option<u8> {
    Some(DEFAULT_CRF)
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}

impl Default for ClipEncoding {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
            extra_args: vec!["-movflags".to_string(), "+faststart".to_string()],
        }
    }
}

impl ClipEncoding {
    /// Settings for precise clip extraction.
    pub fn for_clip() -> Self {
        Self::default()
    }

    /// Settings for re-encoding a segment when stream copy fails.
    pub fn for_segment_fallback() -> Self {
        Self {
            preset: None,
            crf: None,
            extra_args: vec!["-strict".to_string(), "experimental".to_string()],
            ..Self::default()
        }
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.codec.clone()];
        if let Some(preset) = &self.preset {
            args.extend(["-preset".to_string(), preset.clone()]);
        }
        if let Some(crf) = self.crf {
            args.extend(["-crf".to_string(), crf.to_string()]);
        }
        args.extend(["-c:a".to_string(), self.audio_codec.clone()]);
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_args() {
        let args = ClipEncoding::for_clip().to_ffmpeg_args();
        assert_eq!(
            args,
            vec![
                "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-movflags",
                "+faststart"
            ]
        );
    }

    #[test]
    fn test_segment_fallback_args() {
        let args = ClipEncoding::for_segment_fallback().to_ffmpeg_args();
        assert!(!args.contains(&"-crf".to_string()));
        assert!(args.ends_with(&["-strict".to_string(), "experimental".to_string()]));
    }

    #[test]
    fn test_deserialize_defaults() {
        let encoding: ClipEncoding = serde_json::from_str("{}").unwrap();
        assert_eq!(encoding.crf, Some(23));
        assert!(encoding.extra_args.is_empty());
    }
}
