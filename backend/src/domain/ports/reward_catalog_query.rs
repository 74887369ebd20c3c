//! Driving port for catalog reads.

use async_trait::async_trait;

use crate::domain::{Error, RewardId, RewardListing};

use super::RewardFilter;

/// Domain use-case port for browsing rewards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardCatalogQuery: Send + Sync {
    /// Active rewards by ascending `xp_cost`, ties broken by title.
    async fn list_active(&self, filter: &RewardFilter) -> Result<Vec<RewardListing>, Error>;

    /// One reward, active or not. Unknown ids yield `INVALID_REWARD`.
    async fn get_reward(&self, id: &RewardId) -> Result<RewardListing, Error>;
}
