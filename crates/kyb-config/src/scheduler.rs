//! Worker pool, lease, and backoff settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_workers() -> usize {
    4
}

const fn default_tick_interval_secs() -> u64 {
    30
}

const fn default_lease_ttl_secs() -> u64 {
    300
}

const fn default_backoff_base_secs() -> u64 {
    60
}

const fn default_backoff_max_secs() -> u64 {
    21_600
}

const fn default_degraded_threshold() -> u32 {
    10
}

const fn default_format_error_cap() -> u32 {
    3
}

const fn default_claim_batch() -> u32 {
    16
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of concurrent worker tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pause between scheduler passes when running continuously.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// How long a claimed job stays leased before another worker may reclaim it.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// First retry delay after a failure.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Upper bound for the exponential backoff.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Consecutive failures after which a job is marked degraded.
    #[serde(default = "default_degraded_threshold")]
    pub degraded_threshold: u32,

    /// Consecutive malformed responses after which a job is marked degraded.
    #[serde(default = "default_format_error_cap")]
    pub format_error_cap: u32,

    /// Candidate jobs inspected per claim attempt.
    #[serde(default = "default_claim_batch")]
    pub claim_batch: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            tick_interval_secs: default_tick_interval_secs(),
            lease_ttl_secs: default_lease_ttl_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            degraded_threshold: default_degraded_threshold(),
            format_error_cap: default_format_error_cap(),
            claim_batch: default_claim_batch(),
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub const fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Backoff after the `failures`-th consecutive failure:
    /// `min(base * 2^(failures - 1), max)`.
    #[must_use]
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32);
        let secs = self
            .backoff_base_secs
            .saturating_mul(1_u64 << exponent)
            .min(self.backoff_max_secs);
        Duration::from_secs(secs)
    }
}
