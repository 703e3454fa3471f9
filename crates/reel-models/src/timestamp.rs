//! Timestamp and time range parsing.
//!
//! AI responses describe clips as `"HH:MM:SS - HH:MM:SS"`. Individual
//! timestamps may also be written as `MM:SS` or plain seconds, with an
//! optional fractional part.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp parsing/validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid {0} value {1}: must be below 60")]
    OutOfRange(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, MM:SS or SS")]
    InvalidFormat(String),

    #[error("Invalid time range '{0}'. Use 'HH:MM:SS - HH:MM:SS'")]
    InvalidRange(String),
}

fn component(name: &'static str, raw: &str, bounded: bool) -> Result<f64, TimestampError> {
    let raw = raw.trim();
    let value: f64 = raw
        .parse()
        .map_err(|_| TimestampError::InvalidValue(name, raw.to_string()))?;
    if !value.is_finite() {
        return Err(TimestampError::InvalidValue(name, raw.to_string()));
    }
    if value < 0.0 {
        return Err(TimestampError::Negative);
    }
    if bounded && value >= 60.0 {
        return Err(TimestampError::OutOfRange(name, raw.to_string()));
    }
    Ok(value)
}

/// Parse a timestamp string to total seconds.
///
/// Supports `HH:MM:SS`, `MM:SS` and `SS`, each with optional fractional
/// seconds. In multi-part forms, minutes and seconds must be below 60.
///
/// # Examples
/// ```
/// use reel_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    match parts.as_slice() {
        [s] => component("seconds", s, false),
        [m, s] => Ok(component("minutes", m, false)? * 60.0 + component("seconds", s, true)?),
        [h, m, s] => Ok(component("hours", h, false)? * 3600.0
            + component("minutes", m, true)? * 60.0
            + component("seconds", s, true)?),
        _ => Err(TimestampError::InvalidFormat(ts.to_string())),
    }
}

/// Format seconds as `HH:MM:SS`, dropping any fractional part.
pub fn format_hms(total_secs: f64) -> String {
    let total = if total_secs.is_finite() && total_secs > 0.0 {
        total_secs.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// A start/end pair in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Parse `"START - END"`. The string must split on `-` into exactly
    /// two timestamps.
    pub fn parse(raw: &str) -> Result<Self, TimestampError> {
        let parts: Vec<&str> = raw.split('-').collect();
        let [start, end] = parts.as_slice() else {
            return Err(TimestampError::InvalidRange(raw.trim().to_string()));
        };
        Ok(Self {
            start: parse_timestamp(start)?,
            end: parse_timestamp(end)?,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_positive(&self) -> bool {
        self.end > self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", format_hms(self.start), format_hms(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_hh_mm_ss() {
        assert_eq!(parse_timestamp("00:00:00").unwrap(), 0.0);
        assert_eq!(parse_timestamp("00:01:00").unwrap(), 60.0);
        assert_eq!(parse_timestamp("01:30:45").unwrap(), 5445.0);
    }

    #[test]
    fn test_parse_timestamp_short_forms() {
        assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
        assert_eq!(parse_timestamp("75:10").unwrap(), 4510.0);
        assert_eq!(parse_timestamp(" 90 ").unwrap(), 90.0);
        assert!((parse_timestamp("00:00:30.500").unwrap() - 30.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert!(matches!(parse_timestamp(""), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("abc"), Err(TimestampError::InvalidValue(_, _))));
        assert!(matches!(parse_timestamp("1:2:3:4"), Err(TimestampError::InvalidFormat(_))));
        assert!(matches!(parse_timestamp("00:61:00"), Err(TimestampError::OutOfRange(_, _))));
        assert!(matches!(parse_timestamp("00:-1"), Err(TimestampError::Negative)));
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(59.9), "00:00:59");
        assert_eq!(format_hms(3661.0), "01:01:01");
        assert_eq!(format_hms(-4.0), "00:00:00");
    }

    #[test]
    fn test_time_range_parse() {
        let range = TimeRange::parse("00:00:05 - 00:00:12").unwrap();
        assert_eq!(range, TimeRange::new(5.0, 12.0));
        assert_eq!(range.duration(), 7.0);
        assert_eq!(range.to_string(), "00:00:05 - 00:00:12");

        assert!(matches!(
            TimeRange::parse("00:00:05"),
            Err(TimestampError::InvalidRange(_))
        ));
        assert!(matches!(
            TimeRange::parse("1 - 2 - 3"),
            Err(TimestampError::InvalidRange(_))
        ));
        assert!(TimeRange::parse("00:00:xx - 00:00:12").is_err());
    }
}
