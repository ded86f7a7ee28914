//! Weighted progress aggregation across concurrently running stages.

use std::sync::{Arc, Mutex};

use slidesync_models::{ProgressUpdate, Stage};

/// Callback receiving progress updates.
pub type ProgressSink = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Sink that drops every update.
pub fn noop_sink() -> ProgressSink {
    Arc::new(|_| {})
}

/// Units of work contributing to overall progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    FirstSlides,
    SecondSlides,
    Frames,
    Inference,
}

impl Slot {
    const ALL: [Slot; 4] = [Slot::FirstSlides, Slot::SecondSlides, Slot::Frames, Slot::Inference];

    /// Share of the overall 100%.
    pub fn weight(&self) -> f64 {
        match self {
            Slot::FirstSlides => 10.0,
            Slot::SecondSlides => 10.0,
            Slot::Frames => 50.0,
            Slot::Inference => 30.0,
        }
    }

    fn index(&self) -> usize {
        match self {
            Slot::FirstSlides => 0,
            Slot::SecondSlides => 1,
            Slot::Frames => 2,
            Slot::Inference => 3,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    fractions: [f64; 4],
    last_percent: f64,
}

/// Folds per-slot fractions into one monotonically non-decreasing
/// percentage. Emission happens under the lock so the sink sees values in
/// order even when stages report from concurrent tasks.
pub struct ProgressAggregator {
    state: Mutex<State>,
    sink: ProgressSink,
}

impl ProgressAggregator {
    pub fn new(sink: ProgressSink) -> Self {
        Self {
            state: Mutex::new(State::default()),
            sink,
        }
    }

    /// Record `fraction` (0..=1) of `slot` as done and emit the new total.
    pub fn report(&self, slot: Slot, fraction: f64, stage: Stage, label: &str) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let current = &mut state.fractions[slot.index()];
        *current = current.max(fraction);

        let total: f64 = Slot::ALL.iter().map(|s| s.weight() * state.fractions[s.index()]).sum();
        let percent = total.clamp(0.0, 100.0).max(state.last_percent);
        state.last_percent = percent;

        (self.sink)(ProgressUpdate::new(percent, stage, label));
    }

    /// Mark `slot` complete.
    pub fn complete(&self, slot: Slot, stage: Stage, label: &str) {
        self.report(slot, 1.0, stage, label);
    }

    /// Emit the terminal 100% update.
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.fractions = [1.0; 4];
        state.last_percent = 100.0;
        (self.sink)(ProgressUpdate::new(100.0, Stage::Complete, Stage::Complete.label()));
    }

    /// Emit the terminal failure update at the current percentage.
    pub fn fail(&self, message: &str) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        (self.sink)(ProgressUpdate::new(state.last_percent, Stage::Failed, message));
    }

    pub fn percent(&self) -> f64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).last_percent
    }
}

impl std::fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("percent", &self.percent())
            .finish()
    }
}
