//! Domain primitives, pure rules and services for the XP ledger.
//!
//! Purpose: derive balances from the activity ledger, expose the reward
//! catalog, and redeem rewards atomically with coupon issuance. Nothing here
//! knows about HTTP or SQL; adapters reach the domain through [`ports`].
//!
//! Public surface:
//! - [`Error`] / [`ErrorCode`]: transport-agnostic failure payload.
//! - [`XpBalance`], [`LevelCurve`], [`compute_streaks`]: balance derivation.
//! - [`Reward`], [`RewardListing`], [`StockLevel`]: catalog entries.
//! - [`evaluate`], [`RedemptionCheck`]: the shared eligibility rules.
//! - [`Coupon`], [`CouponIssuer`]: code generation and expiry.
//! - [`RedemptionService`], [`BalanceService`], [`CatalogService`],
//!   [`HistoryService`]: driving-port implementations.

pub mod balance;
pub mod balance_service;
pub mod catalog_service;
pub mod coupon;
pub mod error;
pub mod history_service;
pub mod idempotency;
pub(crate) mod port_error_mapping;
pub mod ports;
pub mod redemption;
pub mod redemption_service;
pub mod reward;
pub mod trace_id;
pub mod user;
pub mod validation;

#[cfg(test)]
pub(crate) mod fixture_clock;

pub use self::balance::{
    DailyXp, LedgerSnapshot, LevelCurve, ParseXpPillarError, PillarTotals, Streaks, XpBalance,
    XpPillar, compute_streaks,
};
pub use self::balance_service::BalanceService;
pub use self::catalog_service::CatalogService;
#[cfg(test)]
pub use self::coupon::MockCouponCodeGenerator;
pub use self::coupon::{
    COUPON_ALPHABET, Coupon, CouponCode, CouponCodeError, CouponCodeGenerator, CouponIssuer,
    CouponPolicy, CouponStatus, RandomCouponCodes,
};
pub use self::error::{Error, ErrorCode};
pub use self::history_service::HistoryService;
pub use self::idempotency::{
    IdempotencyConfig, IdempotencyKey, IdempotencyKeyValidationError, IdempotencyLookupQuery,
    IdempotencyLookupResult, IdempotencyRecord, PayloadHash, PayloadHashError,
    canonicalize_and_hash,
};
pub use self::redemption::{
    DeliveryInfo, HistoryPage, NewRedemption, ParseRedemptionStatusError, RedeemRequest,
    RedeemedReward, Redemption, RedemptionHistoryEntry, RedemptionId, RedemptionOutcome,
    RedemptionReceipt, RedemptionStatus,
};
pub use self::redemption_service::{RedemptionPolicy, RedemptionPorts, RedemptionService};
pub use self::reward::{Reward, RewardId, RewardListing, RewardValidationError, StockLevel};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{UserId, UserIdValidationError};
pub use self::validation::{RedemptionCheck, RejectionReason, evaluate};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use rewards_ledger::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<u64> {
///     Err(Error::invalid_request("nope"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
