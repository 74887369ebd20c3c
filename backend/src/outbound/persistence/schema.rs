//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Per-user anchor row locked by redemptions.
    user_profiles (id) {
        id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only activity ledger owned by external writers.
    xp_events (id) {
        id -> Int8,
        user_id -> Uuid,
        /// One of `physical`, `nutrition`, `emotional`, `spiritual`.
        pillar -> Text,
        amount -> Int8,
        occurred_at -> Timestamptz,
    }
}

diesel::table! {
    /// Reward catalog. `stock_quantity` of NULL means unlimited.
    rewards (id) {
        id -> Uuid,
        title -> Text,
        description -> Nullable<Text>,
        category -> Text,
        partner_name -> Nullable<Text>,
        image_url -> Nullable<Text>,
        xp_cost -> Int8,
        is_active -> Bool,
        stock_quantity -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Redemptions; `sequence` orders rows by insertion.
    reward_redemptions (id) {
        id -> Uuid,
        sequence -> Int8,
        user_id -> Uuid,
        reward_id -> Uuid,
        xp_spent -> Int8,
        status -> Text,
        delivery_info -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Coupons, one per redemption, with globally unique codes.
    reward_coupons (id) {
        id -> Uuid,
        redemption_id -> Uuid,
        code -> Text,
        is_used -> Bool,
        used_at -> Nullable<Timestamptz>,
        issued_at -> Timestamptz,
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    /// Stored redemption receipts keyed by `(user_id, key)`.
    idempotency_keys (user_id, key) {
        user_id -> Uuid,
        key -> Uuid,
        payload_hash -> Bytea,
        response_snapshot -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(xp_events -> user_profiles (user_id));
diesel::joinable!(reward_redemptions -> user_profiles (user_id));
diesel::joinable!(reward_redemptions -> rewards (reward_id));
diesel::joinable!(reward_coupons -> reward_redemptions (redemption_id));
diesel::joinable!(idempotency_keys -> user_profiles (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    user_profiles,
    xp_events,
    rewards,
    reward_redemptions,
    reward_coupons,
    idempotency_keys,
);
