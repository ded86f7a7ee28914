//! Slide-to-video alignment pipeline.
//!
//! Given two ordered slide documents and a recording of them being
//! presented, find when each slide first appears:
//!
//! 1. Rasterize both documents and sample the recording at a fixed interval
//! 2. Send slides and frames to a multimodal model in one request
//! 3. Repair and parse the model's answer
//! 4. Shift every reported time back by half the sampling interval
//!
//! [`Orchestrator`] runs the whole sequence; the pure stages are usable on
//! their own.

pub mod config;
pub mod consistency;
pub mod correction;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod recovery;
pub mod retry;

pub use config::{ExecutionMode, PipelineConfig};
pub use consistency::{check_alignment, AlignmentReport};
pub use correction::{correct_seconds, correct_transitions, midpoint_shift};
pub use error::{FailureKind, PipelineError, PipelineResult, RunFailure};
pub use logging::{init_tracing, RunLogger};
pub use orchestrator::{InventoryCache, Orchestrator};
pub use progress::{noop_sink, ProgressAggregator, ProgressSink, Slot};
pub use prompt::{response_schema, PromptAssembler, DEFAULT_MAX_OUTPUT_TOKENS};
pub use recovery::{
    recover_transitions, recover_with_report, repair_response_text, Recovery, RecoveryError, RepairReport,
    RepairedText,
};
pub use retry::{retry_async, RetryConfig, RetryResult};
