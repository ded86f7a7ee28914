//! Runs one alignment: extraction, prompt, inference, recovery, correction.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{info, warn, Instrument};

use slidesync_media::{validate_slides, FrameDecoder, FrameSampler, SlideRasterizer};
use slidesync_ml_client::{InferenceClient, InferenceRequest};
use slidesync_models::{realized_interval, AlignmentResult, ReferenceSlide, SampledFrame, SourceId, Stage};

use crate::config::{ExecutionMode, PipelineConfig};
use crate::consistency::check_alignment;
use crate::correction::correct_transitions;
use crate::error::{PipelineError, PipelineResult, RunFailure};
use crate::logging::RunLogger;
use crate::metrics;
use crate::progress::{noop_sink, ProgressAggregator, ProgressSink, Slot};
use crate::prompt::PromptAssembler;
use crate::recovery::{recover_with_report, Recovery};
use crate::retry::retry_async;

/// Slide and frame inventories kept across runs until a run succeeds.
#[derive(Debug, Clone, Default)]
pub struct InventoryCache {
    first: Option<Vec<ReferenceSlide>>,
    second: Option<Vec<ReferenceSlide>>,
    frames: Option<Vec<SampledFrame>>,
}

impl InventoryCache {
    pub fn slides(&self, source_id: SourceId) -> Option<&[ReferenceSlide]> {
        match source_id {
            SourceId::First => self.first.as_deref(),
            SourceId::Second => self.second.as_deref(),
        }
    }

    pub fn frames(&self) -> Option<&[SampledFrame]> {
        self.frames.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none() && self.frames.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.second.is_some() && self.frames.is_some()
    }

    fn slides_mut(&mut self, source_id: SourceId) -> &mut Option<Vec<ReferenceSlide>> {
        match source_id {
            SourceId::First => &mut self.first,
            SourceId::Second => &mut self.second,
        }
    }
}

/// Sequences the pipeline stages for one pair of documents and one recording.
///
/// Inventories extracted by a failed run are kept, so calling [`run`] again
/// with the same inputs skips straight to the stages that have not completed.
/// Call [`clear_cache`] before reusing the orchestrator for different inputs.
///
/// [`run`]: Orchestrator::run
/// [`clear_cache`]: Orchestrator::clear_cache
pub struct Orchestrator {
    config: PipelineConfig,
    rasterizer: Arc<dyn SlideRasterizer>,
    client: Arc<dyn InferenceClient>,
    progress: ProgressSink,
    cancel_rx: Option<watch::Receiver<bool>>,
    cache: InventoryCache,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        rasterizer: Arc<dyn SlideRasterizer>,
        client: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            client,
            progress: noop_sink(),
            cancel_rx: None,
            cache: InventoryCache::default(),
        }
    }

    /// Receive progress updates.
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    /// Stop scheduling work once the flag flips to `true`. In-flight captures
    /// and requests are allowed to finish.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &InventoryCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache = InventoryCache::default();
    }

    /// Align `video` against the two documents.
    ///
    /// Any failure ends the run with a [`RunFailure`]; no partial result is
    /// returned.
    pub async fn run(
        &mut self,
        first_document: &[u8],
        second_document: &[u8],
        video: &mut dyn FrameDecoder,
    ) -> Result<AlignmentResult, RunFailure> {
        let logger = RunLogger::new("alignment");
        let span = logger.create_span();
        self.run_logged(first_document, second_document, video, &logger)
            .instrument(span)
            .await
    }

    async fn run_logged(
        &mut self,
        first_document: &[u8],
        second_document: &[u8],
        video: &mut dyn FrameDecoder,
        logger: &RunLogger,
    ) -> Result<AlignmentResult, RunFailure> {
        logger.log_start(&format!(
            "backend={}, mode={:?}, target_frames={}",
            self.client.name(),
            self.config.execution_mode,
            self.config.sampling.target_frame_count
        ));
        let started = Instant::now();
        let progress = ProgressAggregator::new(self.progress.clone());

        match self
            .execute(first_document, second_document, video, &progress, logger)
            .await
        {
            Ok(result) => {
                progress.finish();
                metrics::record_run("success");
                logger.log_completion(&format!(
                    "{} transitions in {:.1}s",
                    result.events.len(),
                    started.elapsed().as_secs_f64()
                ));
                Ok(result)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                let failure = RunFailure::from(e);
                metrics::record_run(failure.kind.as_str());
                progress.fail(&failure.message);
                Err(failure)
            }
        }
    }

    async fn execute(
        &mut self,
        first_document: &[u8],
        second_document: &[u8],
        video: &mut dyn FrameDecoder,
        progress: &ProgressAggregator,
        logger: &RunLogger,
    ) -> PipelineResult<AlignmentResult> {
        self.check_cancelled()?;
        if !self.cache.is_empty() {
            logger.log_progress("Reusing inventories from the previous attempt");
        }
        self.extract(first_document, second_document, video, progress)
            .await?;

        let (request, interval) = {
            let (Some(first), Some(second), Some(frames)) =
                (&self.cache.first, &self.cache.second, &self.cache.frames)
            else {
                return Err(PipelineError::internal("inventories missing after extraction"));
            };
            let request = PromptAssembler::new(self.config.max_output_tokens).assemble(first, second, frames);
            (request, realized_interval(frames))
        };

        self.check_cancelled()?;
        progress.report(Slot::Inference, 0.0, Stage::Inference, Stage::Inference.label());
        logger.log_progress(&format!(
            "Sending {} images ({} bytes) to {}",
            request.image_count(),
            request.image_bytes(),
            self.client.name()
        ));

        let recovery = retry_async(&self.config.retry, PipelineError::is_retryable, || {
            self.infer_once(&request)
        })
        .await
        .into_result()?;

        progress.report(Slot::Inference, 0.9, Stage::Recovering, Stage::Recovering.label());
        let events = correct_transitions(&recovery.records, interval);
        if events.len() < recovery.records.len() {
            logger.log_warning(&format!(
                "Dropped {} of {} transition records",
                recovery.records.len() - events.len(),
                recovery.records.len()
            ));
        }

        let report = check_alignment(&events);
        if !report.is_consistent() {
            logger.log_warning(&format!("Alignment looks inconsistent: {}", report.summary()));
        }

        let cache = std::mem::take(&mut self.cache);
        let slides = cache.first.into_iter().chain(cache.second).flatten();
        let result = AlignmentResult::new(events, slides, cache.frames.unwrap_or_default(), interval);

        let unknown = result
            .events
            .iter()
            .filter(|event| result.slide_for(event).is_none())
            .count();
        if unknown > 0 {
            logger.log_warning(&format!("{} transitions reference pages that were not rendered", unknown));
        }

        Ok(result)
    }

    /// Fill whatever the cache is missing. Parts that succeed are kept even
    /// when another part fails.
    async fn extract(
        &mut self,
        first_document: &[u8],
        second_document: &[u8],
        video: &mut dyn FrameDecoder,
        progress: &ProgressAggregator,
    ) -> PipelineResult<()> {
        let mut error = None;

        match self.config.execution_mode {
            ExecutionMode::Sequential => {
                for (document, source_id) in [(first_document, SourceId::First), (second_document, SourceId::Second)] {
                    let result = self.slides_stage(document, source_id, progress).await;
                    keep(self.cache.slides_mut(source_id), result, &mut error);
                    if let Some(e) = error.take() {
                        return Err(e);
                    }
                }
                let result = self.frames_stage(video, progress).await;
                keep(&mut self.cache.frames, result, &mut error);
            }
            ExecutionMode::Concurrent => {
                let (first, second, frames) = tokio::join!(
                    self.slides_stage(first_document, SourceId::First, progress),
                    self.slides_stage(second_document, SourceId::Second, progress),
                    self.frames_stage(video, progress),
                );
                keep(&mut self.cache.first, first, &mut error);
                keep(&mut self.cache.second, second, &mut error);
                keep(&mut self.cache.frames, frames, &mut error);
            }
        }

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Rasterize one document unless it is cached. `Ok(None)` means cached.
    async fn slides_stage(
        &self,
        document: &[u8],
        source_id: SourceId,
        progress: &ProgressAggregator,
    ) -> PipelineResult<Option<Vec<ReferenceSlide>>> {
        let slot = match source_id {
            SourceId::First => Slot::FirstSlides,
            SourceId::Second => Slot::SecondSlides,
        };
        let label = format!("Rendering source {} slides", source_id);

        if self.cache.slides(source_id).is_some() {
            progress.complete(slot, Stage::RasterizingSlides, &label);
            return Ok(None);
        }

        self.check_cancelled()?;
        progress.report(slot, 0.0, Stage::RasterizingSlides, &label);

        let slides = self.rasterizer.rasterize(document, source_id).await?;
        validate_slides(&slides, source_id)?;
        if slides.is_empty() {
            warn!(source = %source_id, "Document rendered no pages");
        }
        info!(source = %source_id, pages = slides.len(), "Slides rendered");

        progress.complete(slot, Stage::RasterizingSlides, &label);
        Ok(Some(slides))
    }

    /// Sample the recording unless frames are cached. `Ok(None)` means cached.
    async fn frames_stage(
        &self,
        video: &mut dyn FrameDecoder,
        progress: &ProgressAggregator,
    ) -> PipelineResult<Option<Vec<SampledFrame>>> {
        let label = Stage::SamplingFrames.label();

        if self.cache.frames.is_some() {
            progress.complete(Slot::Frames, Stage::SamplingFrames, label);
            return Ok(None);
        }

        self.check_cancelled()?;
        let mut sampler = FrameSampler::new(self.config.sampling.clone());
        if let Some(cancel_rx) = &self.cancel_rx {
            sampler = sampler.with_cancel(cancel_rx.clone());
        }

        let frames = sampler
            .sample(video, |percent| {
                progress.report(Slot::Frames, percent / 100.0, Stage::SamplingFrames, label)
            })
            .await?;

        metrics::record_frames_sampled(frames.len());
        info!(
            frames = frames.len(),
            interval = realized_interval(&frames),
            "Frames sampled"
        );

        progress.complete(Slot::Frames, Stage::SamplingFrames, label);
        Ok(Some(frames))
    }

    /// One inference round trip followed by response recovery.
    async fn infer_once(&self, request: &InferenceRequest) -> PipelineResult<Recovery> {
        let started = Instant::now();
        let text = self.client.infer(request).await?;
        metrics::record_inference_latency(started.elapsed().as_secs_f64());

        let recovery = recover_with_report(&text)?;
        if !recovery.report.is_clean() {
            warn!(
                repairs = ?recovery.report.applied(),
                records = recovery.records.len(),
                "Model response needed repair"
            );
            metrics::record_repairs(&recovery.report);
        }
        Ok(recovery)
    }

    fn check_cancelled(&self) -> PipelineResult<()> {
        match &self.cancel_rx {
            Some(rx) if *rx.borrow() => Err(PipelineError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Store a stage result in its cache slot, remembering the first error.
fn keep<T>(slot: &mut Option<T>, result: PipelineResult<Option<T>>, error: &mut Option<PipelineError>) {
    match result {
        Ok(Some(value)) => *slot = Some(value),
        Ok(None) => {}
        Err(e) => {
            if error.is_none() {
                *error = Some(e);
            }
        }
    }
}
