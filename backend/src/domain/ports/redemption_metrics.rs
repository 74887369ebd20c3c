//! Domain port surface for recording redemption outcomes.
//!
//! Implementations may export to Prometheus or discard the event. Recording
//! never influences the outcome returned to the caller.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording redemption metrics.
    pub enum RedemptionMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "redemption metrics exporter failed: {message}",
    }
}

/// Terminal result of one redeem call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedemptionOutcomeKind {
    Redeemed,
    Replayed,
    InsufficientXp,
    OutOfStock,
    RewardUnavailable,
    IdempotencyConflict,
    CouponGenerationFailed,
    Failed,
    Timeout,
}

impl RedemptionOutcomeKind {
    /// Every outcome, used to pre-register label values.
    pub const ALL: [Self; 9] = [
        Self::Redeemed,
        Self::Replayed,
        Self::InsufficientXp,
        Self::OutOfStock,
        Self::RewardUnavailable,
        Self::IdempotencyConflict,
        Self::CouponGenerationFailed,
        Self::Failed,
        Self::Timeout,
    ];

    /// Label value exported to the metrics backend.
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Redeemed => "redeemed",
            Self::Replayed => "replayed",
            Self::InsufficientXp => "insufficient_xp",
            Self::OutOfStock => "out_of_stock",
            Self::RewardUnavailable => "reward_unavailable",
            Self::IdempotencyConflict => "idempotency_conflict",
            Self::CouponGenerationFailed => "coupon_generation_failed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }
}

/// Metrics recording port for redemption outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionMetrics: Send + Sync {
    /// Count one redeem call ending in `outcome`.
    async fn record_outcome(
        &self,
        outcome: RedemptionOutcomeKind,
    ) -> Result<(), RedemptionMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpRedemptionMetrics;

#[async_trait]
impl RedemptionMetrics for NoOpRedemptionMetrics {
    async fn record_outcome(
        &self,
        _outcome: RedemptionOutcomeKind,
    ) -> Result<(), RedemptionMetricsError> {
        Ok(())
    }
}
