//! OpenAPI schema definitions for domain types.
//!
//! Domain types remain framework-agnostic by not deriving `ToSchema`. This
//! module provides the schema definitions required for OpenAPI documentation
//! using utoipa's external schema registration.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
///
/// Stable machine-readable error codes returned in API error responses.
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed or fails validation.
    #[schema(rename = "INVALID_REQUEST")]
    InvalidRequest,
    /// Authentication failed or is missing.
    #[schema(rename = "UNAUTHORIZED")]
    Unauthorized,
    /// The user identifier does not refer to a known user.
    #[schema(rename = "INVALID_USER")]
    InvalidUser,
    /// The reward identifier does not refer to a catalog entry.
    #[schema(rename = "INVALID_REWARD")]
    InvalidReward,
    /// The spendable balance is below the reward cost.
    #[schema(rename = "INSUFFICIENT_XP")]
    InsufficientXp,
    /// A finite-stock reward has no units left.
    #[schema(rename = "OUT_OF_STOCK")]
    OutOfStock,
    /// The reward is missing or deactivated.
    #[schema(rename = "REWARD_UNAVAILABLE")]
    RewardUnavailable,
    /// An idempotency key was reused for a different reward.
    #[schema(rename = "IDEMPOTENCY_CONFLICT")]
    IdempotencyConflict,
    /// The redemption was rolled back.
    #[schema(rename = "REDEMPTION_FAILED")]
    RedemptionFailed,
    /// No unique coupon code could be issued; the redemption was cancelled.
    #[schema(rename = "COUPON_GENERATION_FAILED")]
    CouponGenerationFailed,
    /// The redemption did not complete within its time budget.
    #[schema(rename = "REDEMPTION_TIMEOUT")]
    RedemptionTimeout,
    /// A dependency is temporarily unavailable.
    #[schema(rename = "SERVICE_UNAVAILABLE")]
    ServiceUnavailable,
    /// An unexpected error occurred on the server.
    #[schema(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
///
/// API error response payload with machine-readable code and human-readable
/// message.
#[derive(ToSchema)]
#[schema(as = crate::domain::Error)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "INSUFFICIENT_XP")]
    error_code: ErrorCodeSchema,
    /// Human-readable message returned to clients.
    #[schema(example = "insufficient XP to redeem this reward")]
    error_message: String,
    /// Observed values behind a business rejection.
    #[schema(example = json!({ "user_xp": 400, "reward_cost": 1000, "available_stock": 3 }))]
    details: Option<serde_json::Value>,
    /// Correlation identifier for tracing this error across systems.
    #[schema(example = "7f1c2d9e-3a4b-4c5d-8e6f-0a1b2c3d4e5f")]
    trace_id: Option<String>,
}
