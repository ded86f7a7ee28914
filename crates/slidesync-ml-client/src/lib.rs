//! Multimodal inference client seam and Gemini backend.
//!
//! The pipeline talks to the model through [`InferenceClient`]: one ordered
//! list of text and image parts in, raw response text out. [`GeminiClient`]
//! implements it against the Gemini `generateContent` REST endpoint; any other
//! backend can be substituted without touching the pipeline.

pub mod client;
pub mod error;
pub mod gemini;
pub mod types;

pub use client::InferenceClient;
pub use error::{MlError, MlResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use types::{InferenceRequest, RequestPart};
