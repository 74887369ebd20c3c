//! Driving port for balance reads.

use async_trait::async_trait;

use crate::domain::{Error, UserId, XpBalance};

/// Domain use-case port for the derived XP balance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceQuery: Send + Sync {
    /// Aggregate the balance for `user_id`. Unknown users yield
    /// `INVALID_USER`.
    async fn balance(&self, user_id: &UserId) -> Result<XpBalance, Error>;
}
