//! Pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use slidesync_models::SamplingSettings;

use crate::error::{PipelineError, PipelineResult};
use crate::prompt::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::retry::RetryConfig;

/// How the extraction stages are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Rasterize both documents, then sample frames
    Sequential,
    /// Run all three extractions at once
    #[default]
    Concurrent,
}

impl FromStr for ExecutionMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "concurrent" => Ok(ExecutionMode::Concurrent),
            other => Err(PipelineError::config(format!("unknown execution mode '{}'", other))),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sampling: SamplingSettings,
    pub execution_mode: ExecutionMode,
    /// Ceiling on the size of the model's answer
    pub max_output_tokens: u32,
    /// Retry policy for empty or unparseable answers
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::detailed()
    }
}

impl PipelineConfig {
    /// Dense sampling, extractions run concurrently.
    pub fn detailed() -> Self {
        Self {
            sampling: SamplingSettings::detailed(),
            execution_mode: ExecutionMode::Concurrent,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            retry: RetryConfig::default(),
        }
    }

    /// Sparser, smaller frames, extractions run one after another.
    pub fn compact() -> Self {
        Self {
            sampling: SamplingSettings::compact(),
            execution_mode: ExecutionMode::Sequential,
            ..Self::detailed()
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingSettings) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create config from environment variables (a `.env` file is loaded
    /// first if present).
    pub fn from_env() -> PipelineResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys keep the preset
    /// value; set but malformed keys are an error.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("SLIDESYNC_PRESET").as_deref().map(str::trim) {
            None | Some("") | Some("detailed") => Self::detailed(),
            Some("compact") => Self::compact(),
            Some(other) => return Err(PipelineError::config(format!("unknown preset '{}'", other))),
        };

        if let Some(v) = parse_var(&lookup, "SLIDESYNC_TARGET_FRAMES")? {
            config.sampling.target_frame_count = v;
        }
        if let Some(v) = parse_var(&lookup, "SLIDESYNC_MIN_INTERVAL_SECS")? {
            config.sampling.min_interval_floor = v;
        }
        if let Some(v) = parse_var(&lookup, "SLIDESYNC_MAX_FRAME_DIMENSION")? {
            config.sampling.max_frame_dimension = v;
        }
        if let Some(v) = parse_var(&lookup, "SLIDESYNC_JPEG_QUALITY")? {
            config.sampling.jpeg_quality = v;
        }
        if let Some(v) = parse_var(&lookup, "SLIDESYNC_EXECUTION_MODE")? {
            config.execution_mode = v;
        }
        if let Some(v) = parse_var(&lookup, "SLIDESYNC_MAX_OUTPUT_TOKENS")? {
            config.max_output_tokens = v;
        }
        if let Some(v) = parse_var(&lookup, "SLIDESYNC_INFERENCE_RETRIES")? {
            config.retry.max_retries = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "SLIDESYNC_RETRY_BASE_DELAY_MS")? {
            config.retry.base_delay = Duration::from_millis(v);
        }

        config
            .sampling
            .validate()
            .map_err(|e| PipelineError::config(e.to_string()))?;
        if config.max_output_tokens == 0 {
            return Err(PipelineError::config("SLIDESYNC_MAX_OUTPUT_TOKENS must be positive"));
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> PipelineResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PipelineError::config(format!("{}='{}': {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_presets() {
        let detailed = PipelineConfig::detailed();
        assert_eq!(detailed.sampling.target_frame_count, 60);
        assert_eq!(detailed.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(detailed.max_output_tokens, 8192);
        assert_eq!(detailed.retry.max_retries, 0);

        let compact = PipelineConfig::compact();
        assert_eq!(compact.sampling.target_frame_count, 40);
        assert_eq!(compact.execution_mode, ExecutionMode::Sequential);
    }

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!("Sequential".parse::<ExecutionMode>().unwrap(), ExecutionMode::Sequential);
        assert_eq!(" concurrent ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Concurrent);
        assert!("parallel".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.sampling, SamplingSettings::detailed());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("SLIDESYNC_PRESET", "compact"),
            ("SLIDESYNC_TARGET_FRAMES", "90"),
            ("SLIDESYNC_EXECUTION_MODE", "concurrent"),
            ("SLIDESYNC_INFERENCE_RETRIES", "2"),
            ("SLIDESYNC_RETRY_BASE_DELAY_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.sampling.target_frame_count, 90);
        assert_eq!(config.sampling.max_frame_dimension, 512);
        assert_eq!(config.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = PipelineConfig::from_lookup(lookup(&[("SLIDESYNC_TARGET_FRAMES", "lots")])).unwrap_err();
        assert!(err.to_string().contains("SLIDESYNC_TARGET_FRAMES"));

        assert!(PipelineConfig::from_lookup(lookup(&[("SLIDESYNC_TARGET_FRAMES", "0")])).is_err());
        assert!(PipelineConfig::from_lookup(lookup(&[("SLIDESYNC_PRESET", "huge")])).is_err());
    }
}
