// Admission service constants (No magic values)
use std::time::Duration;

/// Default interval between admission cycles (1s)
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(1);

/// Sleep duration after a failed snapshot pull before retry (2s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(2);

/// Queues walked concurrently by default (sequential)
pub const DEFAULT_MAX_PARALLEL_QUEUES: usize = 1;

/// Priority used when neither a number nor a resolvable class is set
pub const DEFAULT_PRIORITY: i32 = 0;

/// Default retry base delay for TimeoutBackoff (1000ms = 1s)
pub const DEFAULT_BACKOFF_BASE_DELAY_MS: i64 = 1000;

/// Default exponential factor for TimeoutBackoff retries
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Retry delay ceiling (5 minutes)
pub const DEFAULT_BACKOFF_MAX_DELAY_MS: i64 = 5 * 60 * 1000;
