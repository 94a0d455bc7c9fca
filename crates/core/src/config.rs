// Admission configuration

use serde::{Deserialize, Serialize};

use crate::application::service::constants::{
    DEFAULT_BACKOFF_BASE_DELAY_MS, DEFAULT_BACKOFF_FACTOR, DEFAULT_BACKOFF_MAX_DELAY_MS,
    DEFAULT_MAX_PARALLEL_QUEUES,
};

/// Tuning knobs for the admission cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Stop admitting in a queue after the first denial
    pub strict_head_of_line: bool,

    /// Number of queues walked concurrently (1 = sequential)
    pub max_parallel_queues: usize,

    /// Dequeued units not bound within this window move to TimeoutBackoff
    pub bind_timeout_ms: Option<i64>,

    /// Retry delay for units in TimeoutBackoff
    pub backoff: BackoffConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            strict_head_of_line: false,
            max_parallel_queues: DEFAULT_MAX_PARALLEL_QUEUES,
            bind_timeout_ms: None,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Exponential retry delay: base_delay * factor^(attempt - 1), capped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: i64,
    pub factor: f64,
    pub max_delay_ms: i64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BACKOFF_BASE_DELAY_MS,
            factor: DEFAULT_BACKOFF_FACTOR,
            max_delay_ms: DEFAULT_BACKOFF_MAX_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: AdmissionConfig =
            serde_json::from_str(r#"{"strict_head_of_line": true, "backoff": {"factor": 3.0}}"#)
                .unwrap();
        assert!(cfg.strict_head_of_line);
        assert_eq!(cfg.max_parallel_queues, DEFAULT_MAX_PARALLEL_QUEUES);
        assert_eq!(cfg.backoff.factor, 3.0);
        assert_eq!(cfg.backoff.base_delay_ms, DEFAULT_BACKOFF_BASE_DELAY_MS);
        assert!(cfg.bind_timeout_ms.is_none());
    }
}
