//! Driving port for validating and executing redemptions.

use async_trait::async_trait;

use crate::domain::{Error, RedeemRequest, RedemptionCheck, RedemptionOutcome, RewardId, UserId};

/// Domain use-case port for the redemption flow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionCommand: Send + Sync {
    /// Advisory, lock-free eligibility check. Business-rule failures are
    /// reported inside the returned check, never as `Err`.
    async fn validate(&self, user_id: &UserId, reward_id: &RewardId)
    -> Result<RedemptionCheck, Error>;

    /// Atomically debit, record and issue a coupon, or fail with no effects.
    async fn redeem(&self, request: RedeemRequest) -> Result<RedemptionOutcome, Error>;
}
