//! Prompt assembly and output parsing for AI clip sequencing.
//!
//! The model answers with plain text: alternating lines of source URI and
//! `HH:MM:SS - HH:MM:SS` time code.

use reel_models::{strip_code_fences, SequencedClip, TimeRange};

/// Line prefix of the summary the model tends to append.
const SUMMARY_PREFIX: &str = "total calculated duration";

/// Concatenate metadata files, each under a header naming its source.
pub fn aggregate_metadata<S: AsRef<str>>(files: &[(S, S)]) -> String {
    files
        .iter()
        .map(|(path, content)| {
            format!("# --- Content from: {} ---\n{}\n\n", path.as_ref(), content.as_ref())
        })
        .collect()
}

pub fn build_sequence_prompt(prompt: &str, aggregated: &str) -> String {
    format!("{}\n\nHere is the metadata from storage files:\n{}", prompt, aggregated)
}

/// Remove code fences and summary lines from the model output.
pub fn clean_sequence_output(text: &str) -> String {
    strip_code_fences(text)
        .lines()
        .filter(|line| !line.trim().to_lowercase().starts_with(SUMMARY_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// A clip pair that could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub line: String,
    pub reason: String,
}

/// Parse cleaned output into clips.
///
/// Non-empty lines are read in pairs. An unpaired trailing line and pairs
/// with unparsable or non-positive time codes are returned as skipped.
pub fn parse_sequence(text: &str) -> (Vec<SequencedClip>, Vec<SkippedEntry>) {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut clips = Vec::new();
    let mut skipped = Vec::new();

    for pair in lines.chunks(2) {
        match pair {
            [source, timecode] => match TimeRange::parse(timecode) {
                Ok(range) if range.is_positive() => clips.push(SequencedClip::new(*source, range)),
                Ok(range) => skipped.push(SkippedEntry {
                    line: timecode.to_string(),
                    reason: format!("Clip {} has no positive duration", range),
                }),
                Err(e) => skipped.push(SkippedEntry {
                    line: timecode.to_string(),
                    reason: e.to_string(),
                }),
            },
            [source] => skipped.push(SkippedEntry {
                line: source.to_string(),
                reason: "Missing time code".to_string(),
            }),
            _ => {}
        }
    }

    (clips, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_and_prompt() {
        let aggregated = aggregate_metadata(&[("ws/metadata/a.json", "[1]"), ("ws/metadata/b.json", "[2]")]);
        assert_eq!(
            aggregated,
            "# --- Content from: ws/metadata/a.json ---\n[1]\n\n# --- Content from: ws/metadata/b.json ---\n[2]\n\n"
        );
        let prompt = build_sequence_prompt("Make a trailer", &aggregated);
        assert!(prompt.starts_with("Make a trailer\n\nHere is the metadata from storage files:\n# ---"));
    }

    #[test]
    fn test_clean_output() {
        let raw = "```\ns3://b/ws/segments/a.mp4\n00:00:10 - 00:00:15\n  Total Calculated Duration: 5s\n```";
        assert_eq!(
            clean_sequence_output(raw),
            "s3://b/ws/segments/a.mp4\n00:00:10 - 00:00:15"
        );
    }

    #[test]
    fn test_parse_sequence() {
        let text = "s3://b/a.mp4\n00:00:10 - 00:00:15\n\ns3://b/b.mp4\n00:01:00 - 00:01:04\ns3://b/c.mp4\nnot a time\ns3://b/d.mp4";
        let (clips, skipped) = parse_sequence(text);

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].source, "s3://b/a.mp4");
        assert_eq!(clips[0].start, 10.0);
        assert_eq!(clips[1].end, 64.0);

        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].line, "not a time");
        assert_eq!(skipped[1].reason, "Missing time code");
    }

    #[test]
    fn test_parse_sequence_rejects_reversed_range() {
        let (clips, skipped) = parse_sequence("s3://b/a.mp4\n00:00:20 - 00:00:10");
        assert!(clips.is_empty());
        assert_eq!(skipped.len(), 1);
    }
}
