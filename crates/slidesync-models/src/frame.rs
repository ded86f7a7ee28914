//! Sampled video frames and the plan that decides where to sample.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image::ImageData;
use crate::timestamp::format_clock;

/// Default number of frames to aim for across the whole recording.
pub const DEFAULT_TARGET_FRAME_COUNT: u32 = 60;
/// Default lower bound on the sampling interval, in seconds.
pub const DEFAULT_MIN_INTERVAL_SECS: f64 = 2.0;
/// Default cap on the larger side of a sampled frame, in pixels.
pub const DEFAULT_MAX_FRAME_DIMENSION: u32 = 768;
/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Tolerance for float drift when counting sample points.
const OFFSET_EPSILON: f64 = 1e-9;

/// One decoded, downscaled frame at a known offset into the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledFrame {
    /// Offset from the start of the recording, in seconds
    pub offset_seconds: f64,
    pub image: ImageData,
    /// Clock label for the offset (e.g. "01:24")
    pub label: String,
}

impl SampledFrame {
    pub fn new(offset_seconds: f64, image: ImageData) -> Self {
        Self {
            offset_seconds,
            image,
            label: format_clock(offset_seconds),
        }
    }

    /// Offset rounded to whole milliseconds, used as an inventory key.
    pub fn offset_millis(&self) -> u64 {
        (self.offset_seconds.max(0.0) * 1000.0).round() as u64
    }
}

/// Sampling knobs that do not depend on the media being sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingSettings {
    /// Number of frames the interval is derived from
    pub target_frame_count: u32,
    /// Lower bound on the interval in seconds (guards very short media)
    pub min_interval_floor: f64,
    /// Largest allowed width or height of a sampled frame
    pub max_frame_dimension: u32,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self::detailed()
    }
}

impl SamplingSettings {
    /// Dense sampling with larger frames.
    pub fn detailed() -> Self {
        Self {
            target_frame_count: DEFAULT_TARGET_FRAME_COUNT,
            min_interval_floor: DEFAULT_MIN_INTERVAL_SECS,
            max_frame_dimension: DEFAULT_MAX_FRAME_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Sparser sampling with smaller, more compressed frames.
    pub fn compact() -> Self {
        Self {
            target_frame_count: 40,
            min_interval_floor: 3.0,
            max_frame_dimension: 512,
            jpeg_quality: 60,
        }
    }

    /// Check that the settings can produce a positive interval and valid frames.
    pub fn validate(&self) -> Result<(), SamplingPlanError> {
        if self.target_frame_count == 0 {
            return Err(SamplingPlanError::InvalidSetting(
                "target_frame_count must be at least 1".to_string(),
            ));
        }
        if !self.min_interval_floor.is_finite() || self.min_interval_floor <= 0.0 {
            return Err(SamplingPlanError::InvalidSetting(format!(
                "min_interval_floor must be positive, got {}",
                self.min_interval_floor
            )));
        }
        if self.max_frame_dimension == 0 {
            return Err(SamplingPlanError::InvalidSetting(
                "max_frame_dimension must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SamplingPlanError::InvalidSetting(format!(
                "jpeg_quality must be within 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Sampling settings bound to a concrete media duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPlan {
    duration: f64,
    interval: f64,
    settings: SamplingSettings,
}

impl SamplingPlan {
    /// Build a plan for media of `duration` seconds.
    ///
    /// The interval is `max(min_interval_floor, duration / target_frame_count)`.
    pub fn new(duration: f64, settings: &SamplingSettings) -> Result<Self, SamplingPlanError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SamplingPlanError::InvalidDuration(duration));
        }
        settings.validate()?;

        let naive = duration / f64::from(settings.target_frame_count);
        let interval = naive.max(settings.min_interval_floor);

        Ok(Self {
            duration,
            interval,
            settings: settings.clone(),
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Spacing between consecutive sample points, always > 0.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn settings(&self) -> &SamplingSettings {
        &self.settings
    }

    /// Number of sample points: `floor(duration / interval) + 1`.
    pub fn point_count(&self) -> usize {
        (self.duration / self.interval + OFFSET_EPSILON).floor() as usize + 1
    }

    /// Sample offsets `0, interval, 2 * interval, ...`, all within `[0, duration]`.
    pub fn offsets(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.point_count()).map(move |k| (k as f64 * self.interval).min(self.duration))
    }

    /// Completion percentage after capturing the frame at `offset`.
    pub fn progress_at(&self, offset: f64) -> f64 {
        if self.duration <= 0.0 {
            return 100.0;
        }
        (offset / self.duration * 100.0).clamp(0.0, 100.0)
    }
}

/// Invalid sampling input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingPlanError {
    #[error("Media duration is not a finite, non-negative number: {0}")]
    InvalidDuration(f64),

    #[error("Invalid sampling setting: {0}")]
    InvalidSetting(String),
}

/// Interval actually used to produce `frames`: the gap between the first two
/// offsets, or 0 when fewer than two frames exist.
pub fn realized_interval(frames: &[SampledFrame]) -> f64 {
    match frames {
        [first, second, ..] => (second.offset_seconds - first.offset_seconds).max(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(target: u32, floor: f64) -> SamplingSettings {
        SamplingSettings {
            target_frame_count: target,
            min_interval_floor: floor,
            ..SamplingSettings::default()
        }
    }

    #[test]
    fn test_interval_uses_naive_division() {
        let plan = SamplingPlan::new(600.0, &settings(60, 2.0)).unwrap();
        assert!((plan.interval() - 10.0).abs() < 1e-9);
        assert_eq!(plan.point_count(), 61);
    }

    #[test]
    fn test_interval_floor_clamps_short_media() {
        let plan = SamplingPlan::new(30.0, &settings(60, 2.0)).unwrap();
        assert!((plan.interval() - 2.0).abs() < 1e-9);
        assert_eq!(plan.point_count(), 16);
    }

    #[test]
    fn test_offsets_cover_duration() {
        let plan = SamplingPlan::new(120.0, &settings(60, 2.0)).unwrap();
        let offsets: Vec<f64> = plan.offsets().collect();
        assert_eq!(offsets.len(), 61);
        assert_eq!(offsets[0], 0.0);
        assert!((offsets[60] - 120.0).abs() < 1e-9);
        assert!(offsets.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_offsets_never_exceed_duration() {
        // 10 / 3 does not divide evenly in binary floating point.
        let plan = SamplingPlan::new(10.0, &settings(3, 0.5)).unwrap();
        let offsets: Vec<f64> = plan.offsets().collect();
        assert_eq!(offsets.len(), 4);
        assert!(offsets.iter().all(|&t| (0.0..=10.0).contains(&t)));
    }

    #[test]
    fn test_point_count_matches_floor_formula() {
        for (duration, target, floor) in [(95.0, 10, 2.0), (7.0, 60, 2.0), (3600.0, 60, 2.0)] {
            let plan = SamplingPlan::new(duration, &settings(target, floor)).unwrap();
            let expected = (duration / plan.interval()).floor() as usize + 1;
            assert_eq!(plan.point_count(), expected);
        }
    }

    #[test]
    fn test_zero_duration_yields_single_point() {
        let plan = SamplingPlan::new(0.0, &settings(60, 2.0)).unwrap();
        assert_eq!(plan.offsets().collect::<Vec<_>>(), vec![0.0]);
        assert_eq!(plan.progress_at(0.0), 100.0);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(matches!(
            SamplingPlan::new(f64::INFINITY, &settings(60, 2.0)),
            Err(SamplingPlanError::InvalidDuration(_))
        ));
        assert!(matches!(
            SamplingPlan::new(f64::NAN, &settings(60, 2.0)),
            Err(SamplingPlanError::InvalidDuration(_))
        ));
        assert!(matches!(
            SamplingPlan::new(10.0, &settings(0, 2.0)),
            Err(SamplingPlanError::InvalidSetting(_))
        ));
        assert!(matches!(
            SamplingPlan::new(10.0, &settings(10, 0.0)),
            Err(SamplingPlanError::InvalidSetting(_))
        ));
        let bad_quality = SamplingSettings {
            jpeg_quality: 0,
            ..SamplingSettings::default()
        };
        assert!(bad_quality.validate().is_err());
    }

    #[test]
    fn test_progress_is_fractional_percentage() {
        let plan = SamplingPlan::new(200.0, &settings(100, 2.0)).unwrap();
        assert!((plan.progress_at(50.0) - 25.0).abs() < 1e-9);
        assert_eq!(plan.progress_at(200.0), 100.0);
    }

    #[test]
    fn test_realized_interval() {
        let image = ImageData::jpeg(vec![], 0, 0);
        assert_eq!(realized_interval(&[]), 0.0);
        let one = vec![SampledFrame::new(0.0, image.clone())];
        assert_eq!(realized_interval(&one), 0.0);
        let two = vec![
            SampledFrame::new(0.0, image.clone()),
            SampledFrame::new(2.5, image),
        ];
        assert_eq!(realized_interval(&two), 2.5);
        assert_eq!(two[1].label, "00:02");
        assert_eq!(two[1].offset_millis(), 2500);
    }
}
