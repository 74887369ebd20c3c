//! Reward catalog implementing [`RewardCatalogQuery`], plus startup seeding.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::port_error_mapping::map_reward_repository_error;
use crate::domain::ports::{RewardCatalogQuery, RewardFilter, RewardRepository};
use crate::domain::{Error, Reward, RewardId, RewardListing};

/// Catalog ordering: ascending cost, then title.
fn listing_order(a: &RewardListing, b: &RewardListing) -> Ordering {
    a.reward
        .xp_cost
        .cmp(&b.reward.xp_cost)
        .then_with(|| a.reward.title.cmp(&b.reward.title))
}

/// Read-only catalog service. Stock is never mutated here.
#[derive(Clone)]
pub struct CatalogService<R: ?Sized> {
    rewards: Arc<R>,
}

impl<R: ?Sized> CatalogService<R> {
    /// Create a catalog service over a reward repository.
    pub const fn new(rewards: Arc<R>) -> Self {
        Self { rewards }
    }
}

impl<R> CatalogService<R>
where
    R: RewardRepository + ?Sized,
{
    /// Validate and upsert catalog definitions, returning how many were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` naming the first invalid entry; nothing is
    /// written in that case.
    pub async fn seed(&self, rewards: &[Reward]) -> Result<usize, Error> {
        for reward in rewards {
            reward.validate().map_err(|err| {
                Error::invalid_request(format!("catalog entry {} is invalid: {err}", reward.id))
            })?;
        }
        for reward in rewards {
            self.rewards
                .upsert(reward)
                .await
                .map_err(map_reward_repository_error)?;
        }
        info!(count = rewards.len(), "reward catalog seeded");
        Ok(rewards.len())
    }
}

#[async_trait]
impl<R> RewardCatalogQuery for CatalogService<R>
where
    R: RewardRepository + ?Sized,
{
    async fn list_active(&self, filter: &RewardFilter) -> Result<Vec<RewardListing>, Error> {
        let mut listings: Vec<RewardListing> = self
            .rewards
            .list_active(filter)
            .await
            .map_err(map_reward_repository_error)?
            .into_iter()
            .filter(|listing| listing.reward.is_active && filter.matches(&listing.reward))
            .collect();
        listings.sort_by(listing_order);
        Ok(listings)
    }

    async fn get_reward(&self, id: &RewardId) -> Result<RewardListing, Error> {
        self.rewards
            .find_listing(id)
            .await
            .map_err(map_reward_repository_error)?
            .ok_or_else(|| Error::invalid_reward(format!("reward {id} not found")))
    }
}
