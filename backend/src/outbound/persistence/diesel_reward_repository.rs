//! PostgreSQL-backed `RewardRepository` implementation.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{RewardFilter, RewardRepository, RewardRepositoryError};
use crate::domain::{Reward, RewardId, RewardListing};

use super::diesel_helpers::{amount_to_db, map_basic_diesel_error, map_pool_error_message};
use super::ledger_queries::{find_reward, listings};
use super::models::{RewardRow, RewardUpsertRow};
use super::pool::{DbPool, PoolError};
use super::schema::rewards;

/// Diesel-backed implementation of the `RewardRepository` port.
#[derive(Clone)]
pub struct DieselRewardRepository {
    pool: DbPool,
}

impl DieselRewardRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> RewardRepositoryError {
    RewardRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> RewardRepositoryError {
    map_basic_diesel_error(
        error,
        "reward catalog",
        RewardRepositoryError::query,
        RewardRepositoryError::connection,
    )
}

fn upsert_row(reward: &Reward) -> Result<RewardUpsertRow<'_>, RewardRepositoryError> {
    Ok(RewardUpsertRow {
        id: *reward.id.as_uuid(),
        title: &reward.title,
        description: reward.description.as_deref(),
        category: &reward.category,
        partner_name: reward.partner_name.as_deref(),
        image_url: reward.image_url.as_deref(),
        xp_cost: amount_to_db(reward.xp_cost, "xp_cost").map_err(RewardRepositoryError::query)?,
        is_active: reward.is_active,
        stock_quantity: reward
            .stock_quantity
            .map(|quantity| amount_to_db(quantity, "stock_quantity"))
            .transpose()
            .map_err(RewardRepositoryError::query)?,
    })
}

#[async_trait]
impl RewardRepository for DieselRewardRepository {
    async fn list_active(
        &self,
        filter: &RewardFilter,
    ) -> Result<Vec<RewardListing>, RewardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = rewards::table
            .filter(rewards::is_active.eq(true))
            .select(RewardRow::as_select())
            .into_boxed();
        if let Some(category) = filter.category.as_deref() {
            query = query.filter(rewards::category.eq(category.to_owned()));
        }
        let rows: Vec<RewardRow> = query
            .order_by((rewards::xp_cost.asc(), rewards::title.asc()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        listings(&mut conn, rows).await.map_err(map_diesel_error)
    }

    async fn find_listing(
        &self,
        id: &RewardId,
    ) -> Result<Option<RewardListing>, RewardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let Some(row) = find_reward(&mut conn, id, false)
            .await
            .map_err(map_diesel_error)?
        else {
            return Ok(None);
        };
        let mut found = listings(&mut conn, vec![row])
            .await
            .map_err(map_diesel_error)?;
        Ok(found.pop())
    }

    async fn upsert(&self, reward: &Reward) -> Result<(), RewardRepositoryError> {
        let row = upsert_row(reward)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::insert_into(rewards::table)
            .values(&row)
            .on_conflict(rewards::id)
            .do_update()
            .set((
                rewards::title.eq(excluded(rewards::title)),
                rewards::description.eq(excluded(rewards::description)),
                rewards::category.eq(excluded(rewards::category)),
                rewards::partner_name.eq(excluded(rewards::partner_name)),
                rewards::image_url.eq(excluded(rewards::image_url)),
                rewards::xp_cost.eq(excluded(rewards::xp_cost)),
                rewards::is_active.eq(excluded(rewards::is_active)),
                rewards::stock_quantity.eq(excluded(rewards::stock_quantity)),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
