//! Shared data models for SlideSync alignment.
//!
//! This crate provides Serde-serializable types for:
//! - Reference slides and their source documents
//! - Sampled video frames and the sampling plan that produced them
//! - Raw (untrusted) and validated transition records
//! - Alignment results and progress messages
//! - Timestamp parsing and formatting

pub mod frame;
pub mod image;
pub mod progress;
pub mod result;
pub mod slide;
pub mod timestamp;
pub mod transition;

// Re-export common types
pub use frame::{realized_interval, SampledFrame, SamplingPlan, SamplingPlanError, SamplingSettings};
pub use image::ImageData;
pub use progress::{ProgressUpdate, Stage};
pub use result::{AlignmentResult, SlideKey};
pub use slide::{ReferenceSlide, SourceId, SourceIdError};
pub use timestamp::{format_clock, parse_timestamp, TimestampError};
pub use transition::{Confidence, RawTransitionRecord, TransitionEnvelope, TransitionEvent};
