//! Caller-facing alignment result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::frame::SampledFrame;
use crate::slide::{ReferenceSlide, SourceId};
use crate::transition::TransitionEvent;

/// Inventory key for a reference slide: (source, 1-based page).
pub type SlideKey = (SourceId, u32);

/// Outcome of one successful run, held in memory only.
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Events in the order the backend reported them
    pub events: Vec<TransitionEvent>,
    /// Reference slides keyed by (source, page)
    pub slides: BTreeMap<SlideKey, ReferenceSlide>,
    /// Sampled frames keyed by offset in milliseconds
    pub frames: BTreeMap<u64, SampledFrame>,
    /// Interval the midpoint correction was based on
    pub sampling_interval: f64,
    pub completed_at: DateTime<Utc>,
}

impl AlignmentResult {
    pub fn new(
        events: Vec<TransitionEvent>,
        slides: impl IntoIterator<Item = ReferenceSlide>,
        frames: impl IntoIterator<Item = SampledFrame>,
        sampling_interval: f64,
    ) -> Self {
        Self {
            events,
            slides: slides
                .into_iter()
                .map(|s| ((s.source_id, s.page_number), s))
                .collect(),
            frames: frames.into_iter().map(|f| (f.offset_millis(), f)).collect(),
            sampling_interval,
            completed_at: Utc::now(),
        }
    }

    /// Slide image an event refers to, if it exists in the inventory.
    pub fn slide_for(&self, event: &TransitionEvent) -> Option<&ReferenceSlide> {
        self.slides.get(&(event.source_id, event.page_number))
    }

    /// Last sampled frame at or before `seconds`.
    pub fn frame_at_or_before(&self, seconds: f64) -> Option<&SampledFrame> {
        let key = (seconds.max(0.0) * 1000.0).round() as u64;
        self.frames.range(..=key).next_back().map(|(_, f)| f)
    }
}
