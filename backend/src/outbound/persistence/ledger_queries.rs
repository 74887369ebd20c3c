//! Queries shared by the read repositories and the redemption unit of work.
//!
//! Each function runs on a borrowed connection so the same SQL serves plain
//! reads and reads inside an open transaction.

use std::collections::HashMap;
use std::str::FromStr;

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_query;
use diesel::sql_types::Uuid as SqlUuid;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::{
    Coupon, CouponCode, DailyXp, DeliveryInfo, LedgerSnapshot, PillarTotals, Redemption,
    RedemptionId, RedemptionStatus, Reward, RewardId, RewardListing, UserId, XpPillar,
};

use super::diesel_helpers::{amount_from_db, corrupt_row};
use super::models::{CouponRow, DailyPillarRow, RedemptionRow, RewardRow, TotalRow};
use super::schema::{reward_redemptions, rewards, user_profiles};

const DAILY_PILLAR_SQL: &str = r#"
SELECT pillar,
       (occurred_at AT TIME ZONE 'UTC')::date AS day,
       SUM(amount)::BIGINT AS amount
FROM xp_events
WHERE user_id = $1
GROUP BY pillar, day
"#;

const APPROVED_SPEND_SQL: &str = r#"
SELECT COALESCE(SUM(xp_spent), 0)::BIGINT AS total
FROM reward_redemptions
WHERE user_id = $1 AND status = 'approved'
"#;

/// Whether the user has a profile, optionally taking its row lock.
pub(crate) async fn profile_exists(
    conn: &mut AsyncPgConnection,
    user_id: &UserId,
    lock: bool,
) -> Result<bool, DieselError> {
    let query = user_profiles::table
        .find(*user_id.as_uuid())
        .select(user_profiles::id);
    let found: Option<Uuid> = if lock {
        query.for_update().first(conn).await.optional()?
    } else {
        query.first(conn).await.optional()?
    };
    Ok(found.is_some())
}

/// Earned and spent aggregates for a user known to exist.
pub(crate) async fn ledger_snapshot(
    conn: &mut AsyncPgConnection,
    user_id: &UserId,
) -> Result<LedgerSnapshot, DieselError> {
    let rows: Vec<DailyPillarRow> = sql_query(DAILY_PILLAR_SQL)
        .bind::<SqlUuid, _>(*user_id.as_uuid())
        .load(conn)
        .await?;
    let spent: TotalRow = sql_query(APPROVED_SPEND_SQL)
        .bind::<SqlUuid, _>(*user_id.as_uuid())
        .get_result(conn)
        .await?;

    let mut earned_by_pillar = PillarTotals::default();
    let mut daily: HashMap<_, u64> = HashMap::new();
    for row in rows {
        let pillar = XpPillar::from_str(&row.pillar).map_err(|err| corrupt_row(err.to_string()))?;
        let amount = amount_from_db(row.amount, "xp_events.amount")?;
        earned_by_pillar.add(pillar, amount);
        let day = daily.entry(row.day).or_default();
        *day = day.saturating_add(amount);
    }

    Ok(LedgerSnapshot {
        earned_by_pillar,
        daily: daily
            .into_iter()
            .map(|(day, amount)| DailyXp { day, amount })
            .collect(),
        xp_spent: amount_from_db(spent.total, "reward_redemptions.xp_spent")?,
    })
}

/// Load one reward row, optionally locking it.
pub(crate) async fn find_reward(
    conn: &mut AsyncPgConnection,
    reward_id: &RewardId,
    lock: bool,
) -> Result<Option<RewardRow>, DieselError> {
    let query = rewards::table
        .find(*reward_id.as_uuid())
        .select(RewardRow::as_select());
    if lock {
        query.for_update().first(conn).await.optional()
    } else {
        query.first(conn).await.optional()
    }
}

/// Pair reward rows with their non-cancelled redemption counts.
pub(crate) async fn listings(
    conn: &mut AsyncPgConnection,
    rows: Vec<RewardRow>,
) -> Result<Vec<RewardListing>, DieselError> {
    let finite_ids: Vec<Uuid> = rows
        .iter()
        .filter(|row| row.stock_quantity.is_some())
        .map(|row| row.id)
        .collect();
    let consumed: HashMap<Uuid, i64> = if finite_ids.is_empty() {
        HashMap::new()
    } else {
        reward_redemptions::table
            .filter(reward_redemptions::reward_id.eq_any(finite_ids))
            .filter(reward_redemptions::status.ne(RedemptionStatus::Cancelled.as_str()))
            .group_by(reward_redemptions::reward_id)
            .select((reward_redemptions::reward_id, count_star()))
            .load::<(Uuid, i64)>(conn)
            .await?
            .into_iter()
            .collect()
    };

    rows.into_iter()
        .map(|row| {
            let count = consumed.get(&row.id).copied().unwrap_or(0);
            Ok(RewardListing {
                consumed: amount_from_db(count, "consumed")?,
                reward: reward_from_row(row)?,
            })
        })
        .collect()
}

pub(crate) fn reward_from_row(row: RewardRow) -> Result<Reward, DieselError> {
    Ok(Reward {
        id: RewardId::from_uuid(row.id),
        title: row.title,
        description: row.description,
        category: row.category,
        partner_name: row.partner_name,
        image_url: row.image_url,
        xp_cost: amount_from_db(row.xp_cost, "rewards.xp_cost")?,
        is_active: row.is_active,
        stock_quantity: row
            .stock_quantity
            .map(|quantity| amount_from_db(quantity, "rewards.stock_quantity"))
            .transpose()?,
    })
}

pub(crate) fn redemption_from_row(row: RedemptionRow) -> Result<Redemption, DieselError> {
    let status =
        RedemptionStatus::from_str(&row.status).map_err(|err| corrupt_row(err.to_string()))?;
    let delivery_info = row
        .delivery_info
        .map(serde_json::from_value::<DeliveryInfo>)
        .transpose()
        .map_err(|err| corrupt_row(format!("invalid delivery_info: {err}")))?;
    Ok(Redemption {
        id: RedemptionId::from_uuid(row.id),
        user_id: UserId::from_uuid(row.user_id),
        reward_id: RewardId::from_uuid(row.reward_id),
        xp_spent: amount_from_db(row.xp_spent, "reward_redemptions.xp_spent")?,
        status,
        sequence: row.sequence,
        created_at: row.created_at,
        delivery_info,
    })
}

pub(crate) fn coupon_from_row(row: CouponRow) -> Result<Coupon, DieselError> {
    Ok(Coupon {
        id: row.id,
        redemption_id: RedemptionId::from_uuid(row.redemption_id),
        code: CouponCode::parse(row.code).map_err(|err| corrupt_row(err.to_string()))?,
        issued_at: row.issued_at,
        expires_at: row.expires_at,
        used_at: row.used_at,
    })
}
