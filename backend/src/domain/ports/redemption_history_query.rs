//! Driving port for redemption history.

use async_trait::async_trait;

use crate::domain::{Error, HistoryPage, RedemptionHistoryEntry, UserId};

/// Domain use-case port for listing a user's redemptions newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionHistoryQuery: Send + Sync {
    /// One page of history with coupon status computed at read time.
    async fn list_redemptions(
        &self,
        user_id: &UserId,
        page: HistoryPage,
    ) -> Result<Vec<RedemptionHistoryEntry>, Error>;
}
