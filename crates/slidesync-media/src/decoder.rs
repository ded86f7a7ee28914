//! Stateful video decode resource.
//!
//! Seeking is stateful: each capture must finish before the next seek is
//! issued. The trait takes `&mut self` so a decoder cannot be shared between
//! two in-flight captures.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::DynamicImage;
use tokio::sync::watch;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Default per-capture timeout for FFmpeg.
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 60;

/// Step back from the end of stream when the frame rate is unknown.
const FALLBACK_FRAME_STEP_SECS: f64 = 0.1;

/// A video that can report its duration and capture frames at offsets.
#[async_trait]
pub trait FrameDecoder: Send {
    /// Duration in seconds. May be non-finite when the media does not know it.
    async fn duration(&mut self) -> MediaResult<f64>;

    /// Seek to `offset_seconds` and capture the frame shown there.
    async fn capture(&mut self, offset_seconds: f64) -> MediaResult<DynamicImage>;
}

/// [`FrameDecoder`] backed by the `ffprobe`/`ffmpeg` binaries.
pub struct FfmpegFrameDecoder {
    path: PathBuf,
    duration: Option<f64>,
    fps: Option<f64>,
    timeout_secs: u64,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegFrameDecoder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            duration: None,
            fps: None,
            timeout_secs: DEFAULT_CAPTURE_TIMEOUT_SECS,
            cancel_rx: None,
        }
    }

    /// Set the per-capture timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Kill in-flight captures when the flag flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn runner(&self) -> FfmpegRunner {
        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);
        match &self.cancel_rx {
            Some(rx) => runner.with_cancel(rx.clone()),
            None => runner,
        }
    }

    /// Seek target for `offset_seconds`.
    ///
    /// No frame starts at or after the end of stream, so offsets there are
    /// pulled back by one frame. Unknown durations leave the offset as is.
    pub fn seek_offset(&self, offset_seconds: f64) -> f64 {
        let Some(duration) = self.duration.filter(|d| d.is_finite() && *d > 0.0) else {
            return offset_seconds;
        };
        let step = self
            .fps
            .filter(|f| f.is_finite() && *f > 0.0)
            .map(|f| 1.0 / f)
            .unwrap_or(FALLBACK_FRAME_STEP_SECS);
        offset_seconds.min((duration - step).max(0.0))
    }

    /// Command that decodes one frame at `offset_seconds` and writes PNG to stdout.
    pub fn capture_command(&self, offset_seconds: f64) -> FfmpegCommand {
        FfmpegCommand::to_stdout(&self.path)
            .seek(self.seek_offset(offset_seconds))
            .single_frame()
            .no_audio()
            .format("image2pipe")
            .video_codec("png")
    }
}

#[async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn duration(&mut self) -> MediaResult<f64> {
        if let Some(duration) = self.duration {
            return Ok(duration);
        }

        let info = probe_video(&self.path).await.map_err(|e| match e {
            MediaError::FfprobeFailed { message, .. } => MediaError::decode_failure(None, message),
            MediaError::JsonParse(e) => {
                MediaError::decode_failure(None, format!("Unreadable probe output: {}", e))
            }
            other => other,
        })?;

        debug!(
            path = %self.path.display(),
            duration = info.duration,
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Probed video"
        );
        self.duration = Some(info.duration);
        self.fps = Some(info.fps);
        Ok(info.duration)
    }

    async fn capture(&mut self, offset_seconds: f64) -> MediaResult<DynamicImage> {
        let cmd = self.capture_command(offset_seconds);
        let bytes = self.runner().capture_stdout(&cmd).await.map_err(|e| match e {
            MediaError::FfmpegFailed { stderr, .. } => MediaError::decode_failure(
                Some(offset_seconds),
                stderr.unwrap_or_else(|| "FFmpeg failed".to_string()),
            ),
            other => other,
        })?;

        if bytes.is_empty() {
            return Err(MediaError::decode_failure(
                Some(offset_seconds),
                "FFmpeg produced no frame (offset past end of stream?)",
            ));
        }

        image::load_from_memory(&bytes)
            .map_err(|e| MediaError::decode_failure(Some(offset_seconds), e.to_string()))
    }
}
