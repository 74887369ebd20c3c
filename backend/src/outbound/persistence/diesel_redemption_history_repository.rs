//! PostgreSQL-backed `RedemptionHistoryRepository` implementation.
//!
//! Joins each redemption with its reward's current title and category and
//! with its coupon, if one was issued. The redemption's own `xp_spent` is the
//! authoritative cost.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{
    RedemptionHistoryRecord, RedemptionHistoryRepository, RedemptionHistoryRepositoryError,
};
use crate::domain::{HistoryPage, UserId};

use super::diesel_helpers::{map_basic_diesel_error, map_pool_error_message};
use super::ledger_queries::{coupon_from_row, redemption_from_row};
use super::models::{CouponRow, RedemptionRow};
use super::pool::{DbPool, PoolError};
use super::schema::{reward_coupons, reward_redemptions, rewards};

type HistoryRow = (RedemptionRow, String, String, Option<CouponRow>);

/// Diesel-backed implementation of the `RedemptionHistoryRepository` port.
#[derive(Clone)]
pub struct DieselRedemptionHistoryRepository {
    pool: DbPool,
}

impl DieselRedemptionHistoryRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> RedemptionHistoryRepositoryError {
    RedemptionHistoryRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> RedemptionHistoryRepositoryError {
    map_basic_diesel_error(
        error,
        "redemption history",
        RedemptionHistoryRepositoryError::query,
        RedemptionHistoryRepositoryError::connection,
    )
}

fn record_from_row(
    (redemption, reward_title, reward_category, coupon): HistoryRow,
) -> Result<RedemptionHistoryRecord, RedemptionHistoryRepositoryError> {
    Ok(RedemptionHistoryRecord {
        redemption: redemption_from_row(redemption).map_err(map_diesel_error)?,
        reward_title,
        reward_category,
        coupon: coupon
            .map(coupon_from_row)
            .transpose()
            .map_err(map_diesel_error)?,
    })
}

#[async_trait]
impl RedemptionHistoryRepository for DieselRedemptionHistoryRepository {
    async fn list_for_user(
        &self,
        user_id: &UserId,
        page: HistoryPage,
    ) -> Result<Vec<RedemptionHistoryRecord>, RedemptionHistoryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = reward_redemptions::table
            .inner_join(rewards::table)
            .left_join(reward_coupons::table)
            .filter(reward_redemptions::user_id.eq(*user_id.as_uuid()))
            .select((
                RedemptionRow::as_select(),
                rewards::title,
                rewards::category,
                Option::<CouponRow>::as_select(),
            ))
            .into_boxed();
        if let Some(before) = page.before {
            query = query.filter(reward_redemptions::sequence.lt(before));
        }
        let rows: Vec<HistoryRow> = query
            .order_by(reward_redemptions::sequence.desc())
            .limit(i64::from(page.limit))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use uuid::Uuid;

    fn redemption_row(status: &str) -> RedemptionRow {
        RedemptionRow {
            id: Uuid::new_v4(),
            sequence: 7,
            user_id: Uuid::new_v4(),
            reward_id: Uuid::new_v4(),
            xp_spent: 500,
            status: status.to_owned(),
            delivery_info: None,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    fn converts_rows_without_coupons() {
        let record = record_from_row((
            redemption_row("cancelled"),
            "Yoga class".to_owned(),
            "physical".to_owned(),
            None,
        ))
        .expect("valid row");

        assert_eq!(record.redemption.sequence, 7);
        assert!(record.coupon.is_none());
    }

    #[rstest]
    fn unknown_status_is_a_query_error() {
        let err = record_from_row((
            redemption_row("refunded"),
            "Yoga class".to_owned(),
            "physical".to_owned(),
            None,
        ))
        .expect_err("corrupt status");

        assert!(matches!(err, RedemptionHistoryRepositoryError::Query { .. }));
    }
}
