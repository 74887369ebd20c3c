//! Driven port for catalog reads and seeding.

use async_trait::async_trait;

use crate::domain::{Reward, RewardId, RewardListing};

use super::define_port_error;

define_port_error! {
    /// Errors raised by reward repository adapters.
    pub enum RewardRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "reward repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "reward repository query failed: {message}",
    }
}

/// Narrowing applied to catalog listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardFilter {
    /// Exact category match when set.
    pub category: Option<String>,
}

impl RewardFilter {
    /// Filter to a single category.
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
        }
    }

    /// Whether `reward` passes the filter.
    pub fn matches(&self, reward: &Reward) -> bool {
        self.category
            .as_deref()
            .is_none_or(|category| reward.category == category)
    }
}

/// Catalog storage with read-time stock derivation.
///
/// Every listing carries the count of non-cancelled redemptions so callers
/// can compute `available_stock` without a stored counter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardRepository: Send + Sync {
    /// Active rewards matching `filter`, in any order.
    async fn list_active(
        &self,
        filter: &RewardFilter,
    ) -> Result<Vec<RewardListing>, RewardRepositoryError>;

    /// A single reward regardless of its active flag.
    async fn find_listing(
        &self,
        id: &RewardId,
    ) -> Result<Option<RewardListing>, RewardRepositoryError>;

    /// Insert or replace a catalog definition.
    async fn upsert(&self, reward: &Reward) -> Result<(), RewardRepositoryError>;
}
