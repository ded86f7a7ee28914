//! Assembly of the single multimodal alignment request.

use serde_json::{json, Value};

use slidesync_ml_client::{InferenceRequest, RequestPart};
use slidesync_models::{format_clock, Confidence, ReferenceSlide, SampledFrame, SourceId};

/// Default ceiling on the model's answer size.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Builds the ordered request: source 1 pages, source 2 pages, video frames,
/// then the instruction block.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_output_tokens: u32,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_TOKENS)
    }
}

impl PromptAssembler {
    pub fn new(max_output_tokens: u32) -> Self {
        Self { max_output_tokens }
    }

    /// Assemble the request. Slides are ordered by page and frames by time
    /// regardless of input order.
    pub fn assemble(
        &self,
        first: &[ReferenceSlide],
        second: &[ReferenceSlide],
        frames: &[SampledFrame],
    ) -> InferenceRequest {
        let mut parts = Vec::with_capacity(2 * (first.len() + second.len() + frames.len()) + 4);

        parts.push(RequestPart::text(format!(
            "REFERENCE SLIDES, SOURCE 1 ({} pages):",
            first.len()
        )));
        push_slides(&mut parts, first);

        parts.push(RequestPart::text(format!(
            "REFERENCE SLIDES, SOURCE 2 ({} pages):",
            second.len()
        )));
        push_slides(&mut parts, second);

        parts.push(RequestPart::text(format!(
            "VIDEO FRAMES ({} frames, in chronological order):",
            frames.len()
        )));
        let mut ordered: Vec<&SampledFrame> = frames.iter().collect();
        ordered.sort_by(|a, b| a.offset_seconds.total_cmp(&b.offset_seconds));
        for frame in ordered {
            parts.push(RequestPart::text(format!("Video frame at {}", frame.label)));
            parts.push(RequestPart::Image(frame.image.clone()));
        }

        parts.push(RequestPart::text(instructions(first.len(), second.len(), frames)));

        InferenceRequest {
            parts,
            response_schema: response_schema(),
            max_output_tokens: self.max_output_tokens,
        }
    }
}

fn push_slides(parts: &mut Vec<RequestPart>, slides: &[ReferenceSlide]) {
    let mut ordered: Vec<&ReferenceSlide> = slides.iter().collect();
    ordered.sort_by_key(|s| s.page_number);
    for slide in ordered {
        parts.push(RequestPart::text(slide.label()));
        parts.push(RequestPart::Image(slide.image.clone()));
    }
}

fn instructions(first_pages: usize, second_pages: usize, frames: &[SampledFrame]) -> String {
    let span = frames
        .iter()
        .map(|f| f.offset_seconds)
        .fold(0.0_f64, f64::max);

    format!(
        r#"TASK: The video frames above were sampled from a recording of a presentation covering {first} slides from Source 1 and {second} slides from Source 2. The recording runs to at least {span}. Find, for each reference slide that appears in the recording, the moment it first appears.

RULES:
- Source 1 is presented before Source 2. There is exactly one transition from Source 1 to Source 2 and the presentation never returns to Source 1 afterwards.
- Skip frames that do not clearly show a slide (speaker close-ups, webcam views, title cards, blank or transition frames). Never match such a frame to a slide.
- Match on visual similarity: compare title text, layout, charts, diagrams and images. Do not rely on page order alone.
- Report only the FIRST frame in which a slide appears. A slide shown again later is not a new transition.
- Use the frame label (MM:SS or HH:MM:SS) of the first matching frame as the timestamp. Never invent timestamps between frame labels.
- List transitions in chronological order.

For each transition provide:
- "timestamp": the frame label
- "sourceId": 1 or 2
- "pageNumber": the page number from the slide label
- "title": the slide's title or a short description
- "reasoning": one sentence on what matched
- "confidence": "High", "Medium" or "Low"

Return ONLY a JSON object of the form {{"transitions": [...]}} following the response schema."#,
        first = first_pages,
        second = second_pages,
        span = format_clock(span),
    )
}

/// Output schema in the OpenAPI subset accepted for structured output.
pub fn response_schema() -> Value {
    let confidence: Vec<&str> = Confidence::REPORTABLE.iter().map(Confidence::as_str).collect();
    let source_ids: Vec<String> = [SourceId::First, SourceId::Second]
        .iter()
        .map(|s| s.to_string())
        .collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "transitions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "timestamp": {
                            "type": "STRING",
                            "description": "Label of the first frame showing the slide, MM:SS or HH:MM:SS"
                        },
                        "sourceId": {
                            "type": "INTEGER",
                            "description": format!("Source document, one of {}", source_ids.join(", "))
                        },
                        "pageNumber": {
                            "type": "INTEGER",
                            "description": "1-based page number within the source"
                        },
                        "title": { "type": "STRING" },
                        "reasoning": { "type": "STRING" },
                        "confidence": {
                            "type": "STRING",
                            "enum": confidence
                        }
                    },
                    "required": ["timestamp", "sourceId", "pageNumber", "title", "reasoning", "confidence"],
                    "propertyOrdering": ["timestamp", "sourceId", "pageNumber", "title", "reasoning", "confidence"]
                }
            }
        },
        "required": ["transitions"]
    })
}
