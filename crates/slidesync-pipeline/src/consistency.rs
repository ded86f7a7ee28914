//! Post-hoc ordering checks on corrected events.
//!
//! The backend is told that source 1 precedes source 2 and that there is a
//! single switch between them. Nothing enforces that; this check only
//! reports when the answer disagrees.

use slidesync_models::{SourceId, TransitionEvent};

/// Findings of [`check_alignment`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentReport {
    /// Number of times consecutive events change source
    pub source_switches: usize,
    /// A source 2 event is followed by a source 1 event
    pub reverted: bool,
    /// Indices of events earlier than their predecessor
    pub time_regressions: Vec<usize>,
}

impl AlignmentReport {
    pub fn is_consistent(&self) -> bool {
        self.source_switches <= 1 && !self.reverted && self.time_regressions.is_empty()
    }

    /// One-line description of what is off.
    pub fn summary(&self) -> String {
        let mut issues = Vec::new();
        if self.source_switches > 1 {
            issues.push(format!("{} source switches", self.source_switches));
        }
        if self.reverted {
            issues.push("returns from source 2 to source 1".to_string());
        }
        if !self.time_regressions.is_empty() {
            issues.push(format!("out of order at {:?}", self.time_regressions));
        }
        if issues.is_empty() {
            "consistent".to_string()
        } else {
            issues.join("; ")
        }
    }
}

/// Check that events move forward in time and switch source at most once,
/// from source 1 to source 2.
pub fn check_alignment(events: &[TransitionEvent]) -> AlignmentReport {
    let mut report = AlignmentReport::default();

    for (index, pair) in events.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        if previous.source_id != current.source_id {
            report.source_switches += 1;
            if previous.source_id == SourceId::Second && current.source_id == SourceId::First {
                report.reverted = true;
            }
        }
        if current.corrected_seconds < previous.corrected_seconds {
            report.time_regressions.push(index + 1);
        }
    }

    report
}
