//! Frame sampler: turns a recording into an ordered set of time-stamped frames.

use tokio::sync::watch;
use tracing::{debug, info};

use slidesync_models::{SampledFrame, SamplingPlan, SamplingSettings};

use crate::decoder::FrameDecoder;
use crate::encode::encode_frame;
use crate::error::{MediaError, MediaResult};

/// Samples frames at a fixed interval derived from the media duration.
///
/// Captures run strictly one after another in time order; the decoder is
/// borrowed mutably for the whole run.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    settings: SamplingSettings,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FrameSampler {
    pub fn new(settings: SamplingSettings) -> Self {
        Self {
            settings,
            cancel_rx: None,
        }
    }

    /// Stop between captures once the flag flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn settings(&self) -> &SamplingSettings {
        &self.settings
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Build the sampling plan for `decoder`'s media.
    ///
    /// Fails with [`MediaError::DurationUnknown`] before any seek when the
    /// duration is not finite.
    pub async fn plan<D>(&self, decoder: &mut D) -> MediaResult<SamplingPlan>
    where
        D: FrameDecoder + ?Sized,
    {
        let duration = decoder.duration().await.map_err(as_decode_failure(None))?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(MediaError::duration_unknown(format!(
                "decoder reported {}",
                duration
            )));
        }
        Ok(SamplingPlan::new(duration, &self.settings)?)
    }

    /// Sample the whole recording.
    ///
    /// `on_progress` receives `t / duration * 100` after each capture, so the
    /// values are non-decreasing and end at 100.
    pub async fn sample<D, F>(&self, decoder: &mut D, on_progress: F) -> MediaResult<Vec<SampledFrame>>
    where
        D: FrameDecoder + ?Sized,
        F: Fn(f64) + Send + Sync,
    {
        let plan = self.plan(decoder).await?;

        info!(
            duration = plan.duration(),
            interval = plan.interval(),
            frames = plan.point_count(),
            "Sampling video frames"
        );

        let max_dimension = self.settings.max_frame_dimension;
        let quality = self.settings.jpeg_quality;
        let mut frames = Vec::with_capacity(plan.point_count());

        for offset in plan.offsets() {
            if self.is_cancelled() {
                return Err(MediaError::Cancelled);
            }

            let raw = decoder
                .capture(offset)
                .await
                .map_err(as_decode_failure(Some(offset)))?;

            // Resizing and JPEG encoding are CPU-bound.
            let image = tokio::task::spawn_blocking(move || encode_frame(&raw, max_dimension, quality))
                .await
                .map_err(|e| MediaError::internal(format!("Frame encoder task failed: {}", e)))??;

            debug!(offset, bytes = image.len(), "Captured frame");
            frames.push(SampledFrame::new(offset, image));
            on_progress(plan.progress_at(offset));
        }

        Ok(frames)
    }
}

/// Fold decoder-side errors into `DecodeFailure`, keeping cancellation and
/// already-classified errors as they are.
fn as_decode_failure(offset: Option<f64>) -> impl Fn(MediaError) -> MediaError {
    move |e| match e {
        MediaError::Cancelled
        | MediaError::DecodeFailure { .. }
        | MediaError::DurationUnknown(_) => e,
        other => MediaError::decode_failure(offset, other.to_string()),
    }
}
