//! Ordered clip lists proposed by the sequencer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::TimeRange;

/// One entry of an ordered clip list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SequencedClip {
    /// Source object, as a URI or a key in the configured bucket
    pub source: String,
    /// Start offset in seconds
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
}

impl SequencedClip {
    pub fn new(source: impl Into<String>, range: TimeRange) -> Self {
        Self {
            source: source.into(),
            start: range.start,
            end: range.end,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequenced_clip_range() {
        let clip = SequencedClip::new("ws/segments/a.mp4", TimeRange::new(3.0, 9.5));
        assert_eq!(clip.range().duration(), 6.5);

        let json = serde_json::to_value(&clip).unwrap();
        assert_eq!(json["source"], "ws/segments/a.mp4");
        assert_eq!(json["end"], 9.5);
    }
}
