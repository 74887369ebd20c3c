//! Driven port for reading past redemptions.

use async_trait::async_trait;

use crate::domain::{Coupon, HistoryPage, Redemption, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by history adapters.
    pub enum RedemptionHistoryRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "redemption history connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "redemption history query failed: {message}",
    }
}

/// A redemption joined with its reward's current title and its coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionHistoryRecord {
    pub redemption: Redemption,
    pub reward_title: String,
    pub reward_category: String,
    pub coupon: Option<Coupon>,
}

/// History reads, newest first by `sequence`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionHistoryRepository: Send + Sync {
    /// Fetch one page of a user's redemptions in descending `sequence` order.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        page: HistoryPage,
    ) -> Result<Vec<RedemptionHistoryRecord>, RedemptionHistoryRepositoryError>;
}
