//! Gemini backend for [`InferenceClient`].
//!
//! Sends the ordered parts as one `generateContent` call with a structured
//! JSON response schema and an output token ceiling.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::InferenceClient;
use crate::error::{MlError, MlResult};
use crate::types::{InferenceRequest, RequestPart};

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Default REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for the Gemini client.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL of the REST API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Sampling temperature; `None` leaves the backend default
    pub temperature: Option<f32>,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(300), // large multimodal requests are slow
            temperature: Some(0.1),
        }
    }

    /// Create config from environment variables (and `.env` if present).
    pub fn from_env() -> MlResult<Self> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| MlError::config("GEMINI_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        config.timeout = Duration::from_secs(
            std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        );
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Gemini API response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_request(&self, request: &InferenceRequest) -> GeminiRequest {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                RequestPart::Text(text) => Part::Text { text: text.clone() },
                RequestPart::Image(image) => Part::InlineData {
                    inline_data: Blob {
                        mime_type: image.mime_type.clone(),
                        data: image.to_base64(),
                    },
                },
            })
            .collect();

        GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.response_schema.clone(),
                max_output_tokens: request.max_output_tokens,
                temperature: self.config.temperature,
            },
        }
    }
}

/// Concatenate the first candidate's text parts, or explain why there are none.
fn extract_text(response: GeminiResponse) -> MlResult<String> {
    let block_reason = response
        .prompt_feedback
        .and_then(|f| f.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(MlError::empty_response(match block_reason {
            Some(reason) => format!("The request was blocked by the model ({})", reason),
            None => "The model returned no candidates".to_string(),
        }));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(MlError::empty_response(format!(
            "The model returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        warn!("Gemini response hit the output token ceiling; expecting a truncated payload");
    }

    Ok(text)
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn infer(&self, request: &InferenceRequest) -> MlResult<String> {
        let url = self.config.endpoint();
        let body = self.build_request(request);

        info!(
            model = %self.config.model,
            parts = request.parts.len(),
            images = request.image_count(),
            image_bytes = request.image_bytes(),
            max_output_tokens = request.max_output_tokens,
            "Sending Gemini request"
        );
        let started = Instant::now();

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MlError::Timeout(self.config.timeout.as_secs())
                } else {
                    MlError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(format!("Failed to parse Gemini response: {}", e)))?;

        let text = extract_text(gemini_response)?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "Gemini response received"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slidesync_models::ImageData;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> InferenceRequest {
        InferenceRequest {
            parts: vec![
                RequestPart::text("Source 1 - Page 1"),
                RequestPart::Image(ImageData::jpeg(b"abc".to_vec(), 1, 1)),
                RequestPart::text("instructions"),
            ],
            response_schema: json!({"type": "OBJECT"}),
            max_output_tokens: 8192,
        }
    }

    fn client(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig::new("test-key")
            .with_model("gemini-test")
            .with_base_url(server.uri());
        GeminiClient::new(config).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::new("k");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(!format!("{:?}", config).contains("\"k\""));
        assert_eq!(
            config.with_base_url("http://x/").endpoint(),
            format!("http://x/models/{}:generateContent", DEFAULT_MODEL)
        );
    }

    #[tokio::test]
    async fn test_infer_sends_ordered_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "{\"transitions\":"}, {"text": "[]}"}]},
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let text = client(&server).infer(&request()).await.unwrap();
        assert_eq!(text, "{\"transitions\":[]}");

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Source 1 - Page 1");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "YWJj");
        assert_eq!(parts[2]["text"], "instructions");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[tokio::test]
    async fn test_safety_block_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let err = client(&server).infer(&request()).await.unwrap_err();
        assert!(matches!(err, MlError::EmptyResponse(_)));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "OTHER"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).infer(&request()).await.unwrap_err();
        assert!(matches!(err, MlError::EmptyResponse(ref m) if m.contains("OTHER")));
    }

    #[tokio::test]
    async fn test_http_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = client(&server).infer(&request()).await.unwrap_err();
        assert!(matches!(err, MlError::RequestFailed(ref m) if m.contains("429")));
    }
}
