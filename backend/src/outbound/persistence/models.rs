//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Text};
use uuid::Uuid;

use super::schema::{idempotency_keys, reward_coupons, reward_redemptions, rewards};

// ---------------------------------------------------------------------------
// Ledger aggregates
// ---------------------------------------------------------------------------

/// Earned XP for one pillar on one UTC day.
#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct DailyPillarRow {
    #[diesel(sql_type = Text)]
    pub pillar: String,
    #[diesel(sql_type = Date)]
    pub day: NaiveDate,
    #[diesel(sql_type = BigInt)]
    pub amount: i64,
}

/// Single `BIGINT` aggregate.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub(crate) struct TotalRow {
    #[diesel(sql_type = BigInt)]
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Reward models
// ---------------------------------------------------------------------------

/// Row struct for reading from the rewards table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = rewards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RewardRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub partner_name: Option<String>,
    pub image_url: Option<String>,
    pub xp_cost: i64,
    pub is_active: bool,
    pub stock_quantity: Option<i64>,
}

/// Insertable/changeset struct for catalog upserts.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = rewards)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct RewardUpsertRow<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub category: &'a str,
    pub partner_name: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub xp_cost: i64,
    pub is_active: bool,
    pub stock_quantity: Option<i64>,
}

// ---------------------------------------------------------------------------
// Redemption models
// ---------------------------------------------------------------------------

/// Row struct for reading from the reward_redemptions table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = reward_redemptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RedemptionRow {
    pub id: Uuid,
    pub sequence: i64,
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub xp_spent: i64,
    pub status: String,
    pub delivery_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for new redemptions; `sequence` is assigned by the
/// database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reward_redemptions)]
pub(crate) struct NewRedemptionRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub xp_spent: i64,
    pub status: &'a str,
    pub delivery_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Coupon models
// ---------------------------------------------------------------------------

/// Row struct for reading from the reward_coupons table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = reward_coupons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CouponRow {
    pub id: Uuid,
    pub redemption_id: Uuid,
    pub code: String,
    pub used_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Insertable struct for new coupons.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reward_coupons)]
pub(crate) struct NewCouponRow<'a> {
    pub id: Uuid,
    pub redemption_id: Uuid,
    pub code: &'a str,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Idempotency key models
// ---------------------------------------------------------------------------

/// Row struct for reading from the idempotency_keys table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = idempotency_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct IdempotencyKeyRow {
    pub user_id: Uuid,
    pub key: Uuid,
    pub payload_hash: Vec<u8>,
    pub response_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for creating new idempotency records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = idempotency_keys)]
pub(crate) struct NewIdempotencyKeyRow<'a> {
    pub user_id: Uuid,
    pub key: Uuid,
    pub payload_hash: &'a [u8],
    pub response_snapshot: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
}
