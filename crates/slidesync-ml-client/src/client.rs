//! The inference seam.

use async_trait::async_trait;

use crate::error::MlResult;
use crate::types::InferenceRequest;

/// A multimodal model backend: one request in, raw response text out.
///
/// Implementations perform exactly one round trip per call and must fail
/// with [`crate::MlError::EmptyResponse`] when no text comes back.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Backend/model name for logs.
    fn name(&self) -> &str;

    async fn infer(&self, request: &InferenceRequest) -> MlResult<String>;
}
