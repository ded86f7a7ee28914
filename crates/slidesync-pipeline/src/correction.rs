//! Validation of raw records and midpoint timestamp correction.
//!
//! A slide change reported at frame `t` happened somewhere in `(t - I, t]`
//! for interval `I`. Reporting the midpoint `t - I/2` halves the worst-case
//! error; the result is clamped at zero.

use tracing::warn;

use slidesync_models::{format_clock, parse_timestamp, Confidence, RawTransitionRecord, SourceId, TransitionEvent};

/// Half the sampling interval; zero for a non-positive or unknown interval.
pub fn midpoint_shift(interval: f64) -> f64 {
    if interval.is_finite() && interval > 0.0 {
        interval / 2.0
    } else {
        0.0
    }
}

/// `max(0, reported - interval / 2)`.
pub fn correct_seconds(reported: f64, interval: f64) -> f64 {
    (reported - midpoint_shift(interval)).max(0.0)
}

/// Validate records and shift their timestamps back by half the interval.
///
/// Records without a parseable timestamp, a known source or a page number
/// are dropped with a warning. Order is preserved.
pub fn correct_transitions(records: &[RawTransitionRecord], interval: f64) -> Vec<TransitionEvent> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match validate(record, interval) {
            Ok(event) => Some(event),
            Err(reason) => {
                warn!(index, ?record, "Dropping transition record: {}", reason);
                None
            }
        })
        .collect()
}

fn validate(record: &RawTransitionRecord, interval: f64) -> Result<TransitionEvent, String> {
    let reported_timestamp = record
        .timestamp
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or("missing timestamp")?;
    let reported = parse_timestamp(reported_timestamp)
        .map_err(|e| format!("bad timestamp '{}': {}", reported_timestamp, e))?;

    let source_id = record.source_id.ok_or("missing sourceId")?;
    let source_id = SourceId::try_from(source_id).map_err(|e| e.to_string())?;

    let page_number = match record.page_number {
        Some(0) => return Err("pageNumber must be at least 1".to_string()),
        Some(page) => page,
        None => return Err("missing pageNumber".to_string()),
    };

    let corrected_seconds = correct_seconds(reported, interval);

    Ok(TransitionEvent {
        corrected_seconds,
        timestamp: format_clock(corrected_seconds),
        reported_timestamp: reported_timestamp.to_string(),
        source_id,
        page_number,
        title: record.title.clone().unwrap_or_default(),
        reasoning: record.reasoning.clone().unwrap_or_default(),
        confidence: record
            .confidence
            .as_deref()
            .map(Confidence::from_label)
            .unwrap_or_default(),
    })
}
