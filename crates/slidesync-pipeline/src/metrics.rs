//! Alignment metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host installs a recorder.

use metrics::{counter, histogram};

use crate::recovery::RepairReport;

/// Metric name constants for consistency.
pub mod names {
    /// Finished runs by outcome (`success` or a failure kind).
    pub const RUNS_TOTAL: &str = "slidesync_runs_total";

    /// Frames captured from recordings.
    pub const FRAMES_SAMPLED_TOTAL: &str = "slidesync_frames_sampled_total";

    /// Inference round-trip time in seconds.
    pub const INFERENCE_LATENCY_SECONDS: &str = "slidesync_inference_latency_seconds";

    /// Text repairs applied to model responses, by repair.
    pub const RECOVERY_REPAIRS_TOTAL: &str = "slidesync_recovery_repairs_total";
}

pub fn record_run(outcome: &str) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_frames_sampled(count: usize) {
    counter!(names::FRAMES_SAMPLED_TOTAL).increment(count as u64);
}

pub fn record_inference_latency(seconds: f64) {
    histogram!(names::INFERENCE_LATENCY_SECONDS).record(seconds);
}

/// Count each repair that had to be applied.
pub fn record_repairs(report: &RepairReport) {
    for repair in report.applied() {
        counter!(names::RECOVERY_REPAIRS_TOTAL, "repair" => repair).increment(1);
    }
}
