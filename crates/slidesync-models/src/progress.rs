//! Progress messages surfaced to the caller.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pipeline stage a progress update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Rasterizing the reference documents
    RasterizingSlides,
    /// Sampling frames from the recording
    SamplingFrames,
    /// Waiting on the inference backend
    Inference,
    /// Repairing and correcting the response
    Recovering,
    /// Run finished successfully
    Complete,
    /// Run ended in the terminal failure state
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RasterizingSlides => "rasterizing_slides",
            Stage::SamplingFrames => "sampling_frames",
            Stage::Inference => "inference",
            Stage::Recovering => "recovering",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        }
    }

    /// Default human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::RasterizingSlides => "Rendering slides",
            Stage::SamplingFrames => "Extracting video frames",
            Stage::Inference => "Matching slides to video",
            Stage::Recovering => "Reading results",
            Stage::Complete => "Done",
            Stage::Failed => "Failed",
        }
    }
}

/// A monotonically increasing completion value plus a stage label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressUpdate {
    /// Overall completion, 0-100
    pub percent: f64,
    pub stage: Stage,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn new(percent: f64, stage: Stage, label: impl Into<String>) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            stage,
            label: label.into(),
            timestamp: Utc::now(),
        }
    }

    /// Percentage rounded for display.
    pub fn whole_percent(&self) -> u8 {
        self.percent.round() as u8
    }
}
