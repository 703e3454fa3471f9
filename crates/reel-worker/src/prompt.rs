//! Prompt template rendering for metadata generation.

use reel_models::format_hms;

/// Placeholder replaced with the segment's file name.
pub const SOURCE_FILENAME_PLACEHOLDER: &str = "{{source_filename}}";

/// Placeholder replaced with the segment's duration.
pub const DURATION_PLACEHOLDER: &str = "{{actual_video_duration}}";

/// Stand-in for the duration when the segment could not be probed.
pub const UNKNOWN_DURATION: &str = "its actual end time";

/// Fill in the template for one segment.
pub fn render_metadata_prompt(template: &str, source_filename: &str, duration: Option<f64>) -> String {
    let duration = duration
        .map(format_hms)
        .unwrap_or_else(|| UNKNOWN_DURATION.to_string());

    template
        .replace(SOURCE_FILENAME_PLACEHOLDER, source_filename)
        .replace(DURATION_PLACEHOLDER, &duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_duration() {
        let prompt = render_metadata_prompt(
            "File {{source_filename}} runs {{actual_video_duration}}. Stay within {{actual_video_duration}}.",
            "movie_part_001.mp4",
            Some(3725.9),
        );
        assert_eq!(
            prompt,
            "File movie_part_001.mp4 runs 01:02:05. Stay within 01:02:05."
        );
    }

    #[test]
    fn test_render_without_duration() {
        let prompt = render_metadata_prompt("End before {{actual_video_duration}}", "a.mp4", None);
        assert_eq!(prompt, "End before its actual end time");
    }
}
