//! Timestamp parsing and formatting utilities.
//!
//! Transition records carry their detection time as clock text ("MM:SS" or
//! "HH:MM:SS"). Sampled frames and corrected events are labeled with the same
//! clock format so the two can be compared side by side.

/// Parse a timestamp string to total seconds.
///
/// Supports formats:
/// - `HH:MM:SS` or `HH:MM:SS.mmm`
/// - `MM:SS` or `MM:SS.mmm`
/// - `SS` or `SS.mmm`
///
/// # Examples
/// ```
/// use slidesync_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let components: [&'static str; 3] = ["hours", "minutes", "seconds"];
    if parts.len() > components.len() {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    // Align the parts to the right so "MM:SS" maps onto minutes/seconds.
    let offset = components.len() - parts.len();
    let mut total = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let name = components[offset + i];
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| TimestampError::InvalidValue(name, part.to_string()))?;
        if !value.is_finite() {
            return Err(TimestampError::InvalidValue(name, part.to_string()));
        }
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        let scale = match name {
            "hours" => 3600.0,
            "minutes" => 60.0,
            _ => 1.0,
        };
        total += value * scale;
    }

    Ok(total)
}

/// Format seconds as a clock label.
///
/// Uses `MM:SS` below one hour and `HH:MM:SS` otherwise. Fractional seconds
/// are truncated; negative input is treated as zero.
///
/// # Examples
/// ```
/// use slidesync_models::timestamp::format_clock;
/// assert_eq!(format_clock(9.0), "00:09");
/// assert_eq!(format_clock(3725.4), "01:02:05");
/// ```
pub fn format_clock(total_secs: f64) -> String {
    // Absorb float noise such as 8.999999999 coming out of the midpoint shift.
    let whole = if total_secs.is_finite() {
        (total_secs.max(0.0) + 1e-6).floor() as u64
    } else {
        0
    };
    let hours = whole / 3600;
    let mins = (whole % 3600) / 60;
    let secs = whole % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampError {
    /// Timestamp string is empty
    Empty,
    /// Timestamp contains negative values
    Negative,
    /// Invalid numeric value for a component
    InvalidValue(&'static str, String),
    /// Invalid timestamp format
    InvalidFormat(String),
}

impl std::fmt::Display for TimestampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Timestamp cannot be empty"),
            Self::Negative => write!(f, "Timestamp cannot be negative"),
            Self::InvalidValue(component, value) => {
                write!(f, "Invalid {} value: {}", component, value)
            }
            Self::InvalidFormat(ts) => write!(
                f,
                "Invalid timestamp format '{}'. Use MM:SS or HH:MM:SS",
                ts
            ),
        }
    }
}

impl std::error::Error for TimestampError {}
