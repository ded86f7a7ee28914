//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use slidesync_models::SamplingPlanError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding, sampling or rasterizing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Media duration is unknown: {0}")]
    DurationUnknown(String),

    #[error("Failed to decode video: {message}")]
    DecodeFailure {
        offset: Option<f64>,
        message: String,
    },

    #[error("Invalid sampling plan: {0}")]
    InvalidPlan(#[from] SamplingPlanError),

    #[error("Slide rasterization failed: {0}")]
    Rasterization(String),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a duration-unknown error.
    pub fn duration_unknown(message: impl Into<String>) -> Self {
        Self::DurationUnknown(message.into())
    }

    /// Create a decode failure, optionally tied to a seek offset.
    pub fn decode_failure(offset: Option<f64>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = match offset {
            Some(t) => format!("at {:.3}s: {}", t, message),
            None => message,
        };
        Self::DecodeFailure { offset, message }
    }

    /// Create a rasterization error.
    pub fn rasterization(message: impl Into<String>) -> Self {
        Self::Rasterization(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error means the decode resource could not load or seek.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            MediaError::DecodeFailure { .. }
                | MediaError::FfmpegFailed { .. }
                | MediaError::FfprobeFailed { .. }
                | MediaError::FileNotFound(_)
        )
    }
}
