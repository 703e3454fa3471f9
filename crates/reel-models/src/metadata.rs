//! AI-generated clip metadata.
//!
//! The AI model describes every trailer-worthy moment of a segment as a
//! [`TrailerClipMetadata`] object. The same struct drives the response
//! schema sent with the request, so the field docs below double as the
//! instructions the model sees.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::timestamp::{TimeRange, TimestampError};

/// Metadata parsing/validation error.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metadata must be a JSON object or an array of objects")]
    InvalidShape,

    #[error("Invalid timestamp_start_end: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("Clip start ({start:.1}s) must be before its end ({end:.1}s)")]
    NotPositive { start: f64, end: f64 },

    #[error("Clip end ({end:.1}s) exceeds video duration ({duration:.1}s)")]
    ExceedsDuration { end: f64, duration: f64 },
}

/// Metadata for a single trailer clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrailerClipMetadata {
    /// The filename of the video clip being analyzed.
    #[serde(default)]
    pub source_filename: String,
    /// Precise in and out points for the clip (HH:MM:SS - HH:MM:SS) relative to the start of the provided video file.
    pub timestamp_start_end: String,
    /// Your rationale for selecting this clip. Why is it trailer-worthy? (Max 30 words)
    #[serde(default)]
    pub editor_note_clip_rationale: String,
    /// Concisely summarize the core action, setting, and characters. (Max 25 words)
    #[serde(default)]
    pub brief_scene_description: String,
    /// Most potent, intriguing, or revealing line(s) of dialogue (verbatim, max 2 lines). If none, state 'None' or 'Action/Visual Only.'
    #[serde(default)]
    pub key_dialogue_snippet: String,
    /// Primary feeling(s) or impact evoked. (Max 5 keywords, comma-separated)
    #[serde(default)]
    pub dominant_emotional_tone_impact: String,
    /// Striking visuals, camera work, lighting, etc. (Max 5 keywords/phrases, comma-separated)
    #[serde(default)]
    pub key_visual_elements_cinematography: String,
    /// Who is central? Their objective or strong emotion? (Max 15 words)
    #[serde(default)]
    pub characters_in_focus_objective_emotion: String,
    /// Why is this moment important for the narrative or trailer? (Max 20 words)
    #[serde(default)]
    pub plot_relevance_significance: String,
    /// How could this clip be used? (Choose one or two from list, comma-separated) Options: Hook/Opening, Character Introduction, Inciting Incident, Conflict Build-up, Rising Action, Tension/Suspense Peak, Emotional Beat, Action Sequence Highlight, Twist/Reveal Tease, Climax Tease, Resolution Glimpse, Cliffhanger/Question, Thematic Montage Element
    #[serde(default)]
    pub trailer_potential_category: String,
    /// How should this clip feel in a trailer sequence? (Choose one from list) Options: Rapid Cut, Medium Pace, Slow Burn/Held Shot, Builds Intensity, Sudden Impact
    #[serde(default)]
    pub pacing_suggestion_for_clip: String,
    /// Optional. Sound to amplify the moment. (Max 10 words)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_sound_cue_idea: Option<String>,
}

impl TrailerClipMetadata {
    /// Parse `timestamp_start_end`.
    pub fn time_range(&self) -> Result<TimeRange, MetadataError> {
        Ok(TimeRange::parse(&self.timestamp_start_end)?)
    }

    /// Check the clip range against the known length of its source.
    ///
    /// With `duration = None` only the range shape is checked.
    pub fn validate_against(&self, duration: Option<f64>) -> Result<TimeRange, MetadataError> {
        let range = self.time_range()?;
        if !range.is_positive() {
            return Err(MetadataError::NotPositive {
                start: range.start,
                end: range.end,
            });
        }
        if let Some(duration) = duration {
            if range.end > duration {
                return Err(MetadataError::ExceedsDuration {
                    end: range.end,
                    duration,
                });
            }
        }
        Ok(range)
    }

    /// Response schema for an array of clip metadata objects, restricted to
    /// the OpenAPI subset the generative endpoint accepts.
    pub fn response_schema() -> Value {
        let mut settings = SchemaSettings::openapi3();
        settings.inline_subschemas = true;
        let root = settings
            .into_generator()
            .into_root_schema_for::<Vec<TrailerClipMetadata>>();
        let raw = serde_json::to_value(root.schema).unwrap_or(Value::Null);
        sanitize_schema(&raw)
    }
}

const SCHEMA_KEYS: &[&str] = &["type", "format", "description", "nullable", "enum", "items", "properties"];

fn sanitize_schema(value: &Value) -> Value {
    let Value::Object(obj) = value else {
        return value.clone();
    };

    let mut out = Map::new();
    for (key, val) in obj {
        if !SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        match key.as_str() {
            "type" => match val {
                Value::String(t) => {
                    out.insert("type".into(), Value::String(t.to_uppercase()));
                }
                Value::Array(types) => {
                    if let Some(t) = types.iter().filter_map(Value::as_str).find(|t| *t != "null") {
                        out.insert("type".into(), Value::String(t.to_uppercase()));
                    }
                    if types.iter().any(|t| t == "null") {
                        out.insert("nullable".into(), Value::Bool(true));
                    }
                }
                _ => {}
            },
            "items" => {
                out.insert("items".into(), sanitize_schema(val));
            }
            "properties" => {
                let Value::Object(props) = val else { continue };
                let mut cleaned = Map::new();
                let mut required = Vec::new();
                for (name, prop) in props {
                    let prop = sanitize_schema(prop);
                    if prop.get("nullable") != Some(&Value::Bool(true)) {
                        required.push(Value::String(name.clone()));
                    }
                    cleaned.insert(name.clone(), prop);
                }
                out.insert("properties".into(), Value::Object(cleaned));
                out.insert("required".into(), Value::Array(required));
            }
            _ => {
                out.insert(key.clone(), val.clone());
            }
        }
    }
    Value::Object(out)
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a metadata document into raw JSON objects.
///
/// A single object is treated as a one-element list.
pub fn parse_metadata_values(text: &str) -> Result<Vec<Value>, MetadataError> {
    match serde_json::from_str::<Value>(strip_code_fences(text))? {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) => Ok(vec![obj]),
        _ => Err(MetadataError::InvalidShape),
    }
}

/// Parse a metadata document, dropping entries that are not clip objects.
pub fn parse_metadata_document(text: &str) -> Result<Vec<TrailerClipMetadata>, MetadataError> {
    Ok(parse_metadata_values(text)?
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
