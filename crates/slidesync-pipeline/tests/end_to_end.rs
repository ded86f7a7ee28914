//! Full pipeline runs against in-memory fakes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use tokio::sync::watch;

use slidesync_media::{FrameDecoder, MediaError, MediaResult, SlideRasterizer};
use slidesync_ml_client::{InferenceClient, InferenceRequest, MlError, MlResult, RequestPart};
use slidesync_models::{ImageData, ProgressUpdate, ReferenceSlide, SourceId, Stage};
use slidesync_pipeline::{
    check_alignment, ExecutionMode, FailureKind, Orchestrator, PipelineConfig, ProgressSink, RetryConfig,
};

const FIRST_DOC: &[u8] = b"%PDF first";
const SECOND_DOC: &[u8] = b"%PDF second";

const RESPONSE: &str = r#"{"transitions":[
  {"timestamp":"00:00","sourceId":1,"pageNumber":1,"title":"Welcome","reasoning":"Title slide","confidence":"High"},
  {"timestamp":"00:10","sourceId":1,"pageNumber":2,"title":"Agenda","reasoning":"Bullet layout matches","confidence":"Medium"},
  {"timestamp":"01:00","sourceId":2,"pageNumber":1,"title":"Results","reasoning":"Same bar chart","confidence":"High"}
]}"#;

struct FakeDecoder {
    duration: f64,
    seeks: Vec<f64>,
}

impl FakeDecoder {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            seeks: Vec::new(),
        }
    }
}

#[async_trait]
impl FrameDecoder for FakeDecoder {
    async fn duration(&mut self) -> MediaResult<f64> {
        Ok(self.duration)
    }

    async fn capture(&mut self, offset_seconds: f64) -> MediaResult<DynamicImage> {
        self.seeks.push(offset_seconds);
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 36, Rgb([200, 200, 200]))))
    }
}

struct FakeRasterizer {
    pages: u32,
    calls: AtomicUsize,
    fail_source: Option<SourceId>,
}

impl FakeRasterizer {
    fn new(pages: u32) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
            fail_source: None,
        }
    }

    fn failing(pages: u32, source_id: SourceId) -> Self {
        Self {
            fail_source: Some(source_id),
            ..Self::new(pages)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlideRasterizer for FakeRasterizer {
    async fn rasterize(&self, document: &[u8], source_id: SourceId) -> MediaResult<Vec<ReferenceSlide>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_source == Some(source_id) {
            return Err(MediaError::rasterization("document is not a PDF"));
        }
        assert!(!document.is_empty());
        Ok((1..=self.pages)
            .map(|page| ReferenceSlide::new(source_id, page, ImageData::jpeg(vec![source_id.as_u8(), page as u8], 8, 6)))
            .collect())
    }
}

struct FakeClient {
    responses: Mutex<VecDeque<MlResult<String>>>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl FakeClient {
    fn new(responses: Vec<MlResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn answering(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceClient for FakeClient {
    fn name(&self) -> &str {
        "fake"
    }

    async fn infer(&self, request: &InferenceRequest) -> MlResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MlError::empty_response("no scripted response left")))
    }
}

fn collecting_sink() -> (ProgressSink, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink: ProgressSink = Arc::new(move |update| sink_seen.lock().unwrap().push(update));
    (sink, seen)
}

fn orchestrator(config: PipelineConfig, rasterizer: &Arc<FakeRasterizer>, client: &Arc<FakeClient>) -> Orchestrator {
    Orchestrator::new(config, rasterizer.clone(), client.clone())
}

#[tokio::test]
async fn test_end_to_end_alignment() {
    let rasterizer = Arc::new(FakeRasterizer::new(2));
    let client = Arc::new(FakeClient::answering(RESPONSE));
    let (sink, seen) = collecting_sink();
    let mut pipeline = orchestrator(PipelineConfig::detailed(), &rasterizer, &client).with_progress(sink);
    let mut video = FakeDecoder::new(120.0);

    let result = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap();

    // 120s / 60 frames with a 2s floor: 61 frames at 0, 2, ..., 120.
    assert_eq!(result.sampling_interval, 2.0);
    assert_eq!(result.frames.len(), 61);
    assert_eq!(video.seeks.len(), 61);
    assert_eq!(video.seeks.last().copied(), Some(120.0));
    assert!(video.seeks.windows(2).all(|w| w[1] > w[0]));

    // Reported times move back by half the interval.
    let timestamps: Vec<&str> = result.events.iter().map(|e| e.timestamp.as_str()).collect();
    assert_eq!(timestamps, vec!["00:00", "00:09", "00:59"]);
    assert_eq!(result.events[1].source_id, SourceId::First);
    assert_eq!(result.events[1].page_number, 2);
    assert_eq!(result.events[1].reported_timestamp, "00:10");
    assert!(check_alignment(&result.events).is_consistent());

    // Inventories come back with the result.
    assert_eq!(result.slides.len(), 4);
    assert!(result.slide_for(&result.events[2]).is_some());
    assert_eq!(result.frame_at_or_before(9.0).map(|f| f.label.as_str()), Some("00:08"));
    assert!(pipeline.cache().is_empty());

    // One request carrying every slide and frame.
    assert_eq!(client.request_count(), 1);
    let requests = client.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.image_count(), 4 + 61);
    assert_eq!(request.max_output_tokens, 8192);
    assert_eq!(request.parts[1].as_text(), Some("Source 1 - Page 1"));
    assert!(matches!(request.parts.last(), Some(RequestPart::Text(text)) if text.starts_with("TASK:")));

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[1].percent >= w[0].percent));
    let last = seen.last().unwrap();
    assert_eq!(last.stage, Stage::Complete);
    assert_eq!(last.percent, 100.0);
}

#[tokio::test]
async fn test_sequential_mode_matches_concurrent() {
    let rasterizer = Arc::new(FakeRasterizer::new(2));
    let client = Arc::new(FakeClient::answering(RESPONSE));
    let config = PipelineConfig::detailed().with_execution_mode(ExecutionMode::Sequential);
    let mut pipeline = orchestrator(config, &rasterizer, &client);
    let mut video = FakeDecoder::new(120.0);

    let result = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap();

    assert_eq!(result.frames.len(), 61);
    assert_eq!(result.events[1].timestamp, "00:09");
    assert_eq!(rasterizer.calls(), 2);
}

#[tokio::test]
async fn test_short_video_uses_interval_floor() {
    let rasterizer = Arc::new(FakeRasterizer::new(1));
    let client = Arc::new(FakeClient::answering(
        r#"{"transitions":[{"timestamp":"00:04","sourceId":2,"pageNumber":1}]}"#,
    ));
    let mut pipeline = orchestrator(PipelineConfig::detailed(), &rasterizer, &client);
    let mut video = FakeDecoder::new(5.0);

    let result = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap();

    assert_eq!(video.seeks, vec![0.0, 2.0, 4.0]);
    assert_eq!(result.sampling_interval, 2.0);
    assert_eq!(result.events[0].corrected_seconds, 3.0);
}

#[tokio::test]
async fn test_truncated_response_keeps_complete_records() {
    let rasterizer = Arc::new(FakeRasterizer::new(2));
    let client = Arc::new(FakeClient::answering(
        r#"{"transitions":[{"timestamp":"00:05","sourceId":1,"pageNumber":1},{"timestamp":"00:1"#,
    ));
    let mut pipeline = orchestrator(PipelineConfig::detailed(), &rasterizer, &client);
    let mut video = FakeDecoder::new(120.0);

    let result = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap();

    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].timestamp, "00:04");
}

#[tokio::test]
async fn test_empty_response_fails_and_keeps_inventories() {
    let rasterizer = Arc::new(FakeRasterizer::new(2));
    let client = Arc::new(FakeClient::new(vec![
        Err(MlError::empty_response("Model returned no content (finish reason: SAFETY)")),
        Ok(RESPONSE.to_string()),
    ]));
    let (sink, seen) = collecting_sink();
    let mut pipeline = orchestrator(PipelineConfig::detailed(), &rasterizer, &client).with_progress(sink);
    let mut video = FakeDecoder::new(120.0);

    let failure = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::EmptyInferenceResponse);
    assert_eq!(failure.message, "Model returned no content (finish reason: SAFETY)");
    assert!(pipeline.cache().is_complete());
    assert_eq!(seen.lock().unwrap().last().map(|u| u.stage), Some(Stage::Failed));

    // The retry reuses slides and frames and only repeats inference.
    let result = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap();

    assert_eq!(result.events.len(), 3);
    assert_eq!(result.frames.len(), 61);
    assert_eq!(rasterizer.calls(), 2);
    assert_eq!(video.seeks.len(), 61);
    assert_eq!(client.request_count(), 2);
    assert!(pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_unparseable_response_keeps_raw_text() {
    let rasterizer = Arc::new(FakeRasterizer::new(1));
    let client = Arc::new(FakeClient::answering("I could not find any slides in this video."));
    let mut pipeline = orchestrator(PipelineConfig::detailed(), &rasterizer, &client);
    let mut video = FakeDecoder::new(30.0);

    let failure = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::RecoverableParseError);
    assert_eq!(
        failure.raw_text.as_deref(),
        Some("I could not find any slides in this video.")
    );
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_opt_in_retry_recovers_from_bad_answer() {
    let rasterizer = Arc::new(FakeRasterizer::new(2));
    let client = Arc::new(FakeClient::new(vec![
        Ok("Sorry, something went wrong.".to_string()),
        Ok(RESPONSE.to_string()),
    ]));
    let config = PipelineConfig::detailed().with_retry(
        RetryConfig::new("inference")
            .with_max_retries(1)
            .with_base_delay(Duration::from_millis(1)),
    );
    let mut pipeline = orchestrator(config, &rasterizer, &client);
    let mut video = FakeDecoder::new(120.0);

    let result = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap();

    assert_eq!(result.events.len(), 3);
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn test_unknown_duration_fails_before_seeking() {
    let rasterizer = Arc::new(FakeRasterizer::new(2));
    let client = Arc::new(FakeClient::answering(RESPONSE));
    let mut pipeline = orchestrator(PipelineConfig::detailed(), &rasterizer, &client);
    let mut video = FakeDecoder::new(f64::NAN);

    let failure = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::DurationUnknown);
    assert!(video.seeks.is_empty());
    assert_eq!(client.request_count(), 0);
    // Slides rendered alongside are still kept.
    assert!(pipeline.cache().slides(SourceId::First).is_some());
    assert!(pipeline.cache().frames().is_none());
}

#[tokio::test]
async fn test_rasterization_failure_is_terminal() {
    let rasterizer = Arc::new(FakeRasterizer::failing(2, SourceId::Second));
    let client = Arc::new(FakeClient::answering(RESPONSE));
    let config = PipelineConfig::detailed().with_execution_mode(ExecutionMode::Sequential);
    let mut pipeline = orchestrator(config, &rasterizer, &client);
    let mut video = FakeDecoder::new(120.0);

    let failure = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Rasterization);
    assert!(failure.message.contains("document is not a PDF"));
    // Sequential mode stops before sampling.
    assert!(video.seeks.is_empty());
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_cancelled_run_schedules_nothing() {
    let rasterizer = Arc::new(FakeRasterizer::new(2));
    let client = Arc::new(FakeClient::answering(RESPONSE));
    let (_cancel_tx, cancel_rx) = watch::channel(true);
    let mut pipeline = orchestrator(PipelineConfig::detailed(), &rasterizer, &client).with_cancel(cancel_rx);
    let mut video = FakeDecoder::new(120.0);

    let failure = pipeline.run(FIRST_DOC, SECOND_DOC, &mut video).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(rasterizer.calls(), 0);
    assert!(video.seeks.is_empty());
    assert_eq!(client.request_count(), 0);
}
