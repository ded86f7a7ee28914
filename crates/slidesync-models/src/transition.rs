//! Transition records: raw (as decoded from model output) and validated.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::slide::SourceId;

/// Root object of the structured response: one array of transition records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionEnvelope {
    pub transitions: Vec<RawTransitionRecord>,
}

/// Untrusted transition record exactly as the backend produced it.
///
/// Every field is optional: a missing field stays missing and is never
/// filled in. Numbers sent as numeric strings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransitionRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub source_id: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub page_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reasoning: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub confidence: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => match n.as_u64() {
            Some(v) => u32::try_from(v).ok(),
            None => n.as_f64().and_then(integral_u32),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// `1.0` counts as `1`; fractions and out-of-range values do not.
fn integral_u32(f: f64) -> Option<u32> {
    (f.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&f)).then_some(f as u32)
}

/// Coarse categorical estimate of match certainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Confidence {
    /// Values the backend is allowed to emit.
    pub const REPORTABLE: [Confidence; 3] = [Confidence::High, Confidence::Medium, Confidence::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
            Confidence::Unknown => "Unknown",
        }
    }

    /// Case-insensitive mapping; anything unrecognized is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, bias-corrected first appearance of a reference slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    /// Corrected offset in seconds, never negative
    pub corrected_seconds: f64,
    /// Clock label for `corrected_seconds`
    pub timestamp: String,
    /// Timestamp as reported, before correction
    pub reported_timestamp: String,
    pub source_id: SourceId,
    pub page_number: u32,
    pub title: String,
    pub reasoning: String,
    pub confidence: Confidence,
}
