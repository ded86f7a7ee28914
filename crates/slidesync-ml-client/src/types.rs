//! Backend-neutral inference request types.

use serde_json::Value;

use slidesync_models::ImageData;

/// One element of an ordered multimodal request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Text(String),
    Image(ImageData),
}

impl RequestPart {
    pub fn text(text: impl Into<String>) -> Self {
        RequestPart::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestPart::Text(text) => Some(text),
            RequestPart::Image(_) => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, RequestPart::Image(_))
    }
}

/// A single multimodal request: ordered parts, a declared output schema and
/// a hard ceiling on output size.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub parts: Vec<RequestPart>,
    /// Structured output schema the response must follow
    pub response_schema: Value,
    /// Maximum output tokens; the response may be cut off at this size
    pub max_output_tokens: u32,
}

impl InferenceRequest {
    pub fn image_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_image()).count()
    }

    /// Total size of inline image payloads in bytes.
    pub fn image_bytes(&self) -> usize {
        self.parts
            .iter()
            .map(|p| match p {
                RequestPart::Image(image) => image.len(),
                RequestPart::Text(_) => 0,
            })
            .sum()
    }
}
