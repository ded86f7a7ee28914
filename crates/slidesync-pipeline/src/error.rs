//! Pipeline error types and the terminal failure surfaced to callers.

use serde::Serialize;
use thiserror::Error;

use slidesync_media::MediaError;
use slidesync_ml_client::MlError;

use crate::recovery::RecoveryError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised inside a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Inference error: {0}")]
    Inference(#[from] MlError),

    #[error("Could not parse model response: {message}")]
    RecoverableParse { message: String, raw_text: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Only an empty answer or an unparseable one is worth asking again;
    /// extraction failures repeat deterministically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Inference(MlError::EmptyResponse(_)) | PipelineError::RecoverableParse { .. }
        )
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Media(MediaError::DurationUnknown(_)) => FailureKind::DurationUnknown,
            PipelineError::Media(MediaError::Rasterization(_)) => FailureKind::Rasterization,
            PipelineError::Media(MediaError::Cancelled) | PipelineError::Cancelled => FailureKind::Cancelled,
            PipelineError::Media(MediaError::InvalidPlan(_)) | PipelineError::Config(_) => {
                FailureKind::Configuration
            }
            PipelineError::Media(_) => FailureKind::DecodeFailure,
            PipelineError::Inference(MlError::EmptyResponse(_)) => FailureKind::EmptyInferenceResponse,
            PipelineError::Inference(_) => FailureKind::InferenceFailed,
            PipelineError::RecoverableParse { .. } => FailureKind::RecoverableParseError,
            PipelineError::Internal(_) => FailureKind::Internal,
        }
    }
}

impl From<RecoveryError> for PipelineError {
    fn from(e: RecoveryError) -> Self {
        PipelineError::RecoverableParse {
            message: e.message,
            raw_text: e.raw_text,
        }
    }
}

/// Category of a terminal run failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DurationUnknown,
    DecodeFailure,
    Rasterization,
    EmptyInferenceResponse,
    InferenceFailed,
    RecoverableParseError,
    Cancelled,
    Configuration,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::DurationUnknown => "duration_unknown",
            FailureKind::DecodeFailure => "decode_failure",
            FailureKind::Rasterization => "rasterization",
            FailureKind::EmptyInferenceResponse => "empty_inference_response",
            FailureKind::InferenceFailed => "inference_failed",
            FailureKind::RecoverableParseError => "recoverable_parse_error",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Configuration => "configuration",
            FailureKind::Internal => "internal",
        }
    }
}

/// Terminal failure of a run, with a message fit for an end user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Raw model output, kept when the response could not be parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl From<PipelineError> for RunFailure {
    fn from(e: PipelineError) -> Self {
        let kind = e.kind();
        let (message, raw_text) = match e {
            PipelineError::Media(MediaError::DurationUnknown(_)) => (
                "Could not determine the length of the video. The file may be damaged or still uploading."
                    .to_string(),
                None,
            ),
            PipelineError::Media(MediaError::Rasterization(detail)) => {
                (format!("Could not render the slides: {}", detail), None)
            }
            PipelineError::Media(MediaError::Cancelled) | PipelineError::Cancelled => {
                ("Alignment was cancelled.".to_string(), None)
            }
            PipelineError::Media(MediaError::InvalidPlan(detail)) => {
                (format!("Invalid sampling settings: {}", detail), None)
            }
            PipelineError::Media(other) => (format!("Could not read the video. {}", other), None),
            // Shown verbatim: the backend's explanation is the useful part.
            PipelineError::Inference(MlError::EmptyResponse(reason)) => (reason, None),
            PipelineError::Inference(other) => (format!("The slide matching request failed: {}", other), None),
            PipelineError::RecoverableParse { message, raw_text } => (
                format!("The model's answer could not be read as a list of transitions: {}", message),
                Some(raw_text),
            ),
            PipelineError::Config(detail) => (format!("Invalid configuration: {}", detail), None),
            PipelineError::Internal(detail) => (format!("Internal error: {}", detail), None),
        };
        RunFailure { kind, message, raw_text }
    }
}
