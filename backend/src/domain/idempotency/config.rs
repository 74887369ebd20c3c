//! Retention and key-derivation settings for idempotency records.

use std::time::Duration;

/// Configuration for idempotency behaviour.
///
/// # Example
///
/// ```
/// # use rewards_ledger::domain::IdempotencyConfig;
/// # use std::time::Duration;
/// let config = IdempotencyConfig::default();
/// assert_eq!(config.ttl(), Duration::from_secs(24 * 3600));
///
/// let clamped = IdempotencyConfig::from_hours(0);
/// assert_eq!(clamped.ttl(), Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyConfig {
    ttl: Duration,
    derived_key_bucket: Duration,
}

impl IdempotencyConfig {
    const DEFAULT_TTL_HOURS: u64 = 24;
    const MIN_TTL_HOURS: u64 = 1;
    /// Ten years.
    const MAX_TTL_HOURS: u64 = 24 * 365 * 10;
    const DEFAULT_BUCKET_SECS: u64 = 30;

    /// Build a configuration from a TTL in hours, clamped to `[1, 87600]`.
    pub fn from_hours(hours: u64) -> Self {
        let hours = hours.clamp(Self::MIN_TTL_HOURS, Self::MAX_TTL_HOURS);
        Self {
            ttl: Duration::from_secs(hours.saturating_mul(3600)),
            ..Self::default()
        }
    }

    /// Override the bucket width used to derive keys for keyless requests.
    ///
    /// A zero width falls back to one second.
    #[must_use]
    pub fn with_derived_key_bucket(mut self, bucket: Duration) -> Self {
        self.derived_key_bucket = bucket.max(Duration::from_secs(1));
        self
    }

    /// Records older than this are eligible for cleanup.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Width of the time bucket folded into derived keys.
    pub const fn derived_key_bucket(&self) -> Duration {
        self.derived_key_bucket
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(Self::DEFAULT_TTL_HOURS * 3600),
            derived_key_bucket: Duration::from_secs(Self::DEFAULT_BUCKET_SECS),
        }
    }
}
