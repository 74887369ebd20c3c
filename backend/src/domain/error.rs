//! Domain-level error types.
//!
//! Errors are transport agnostic. The HTTP adapter maps each [`ErrorCode`] to a
//! status code; the domain only decides which category a failure belongs to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TraceId;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// Authentication failed or is missing.
    Unauthorized,
    /// The user identifier does not refer to a known user.
    InvalidUser,
    /// The reward identifier does not refer to a catalog entry.
    InvalidReward,
    /// The user's spendable balance is below the reward cost.
    InsufficientXp,
    /// A finite-stock reward has no units left.
    OutOfStock,
    /// The reward is missing or deactivated.
    RewardUnavailable,
    /// An idempotency key was reused with a different payload.
    IdempotencyConflict,
    /// The atomic redemption failed and was rolled back.
    RedemptionFailed,
    /// No unique coupon code could be issued; the redemption was cancelled.
    CouponGenerationFailed,
    /// The redemption could not complete within its time budget.
    RedemptionTimeout,
    /// A dependency is temporarily unavailable.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    /// Stable string form, matching the serialised representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidUser => "INVALID_USER",
            Self::InvalidReward => "INVALID_REWARD",
            Self::InsufficientXp => "INSUFFICIENT_XP",
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::RewardUnavailable => "REWARD_UNAVAILABLE",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::RedemptionFailed => "REDEMPTION_FAILED",
            Self::CouponGenerationFailed => "COUPON_GENERATION_FAILED",
            Self::RedemptionTimeout => "REDEMPTION_TIMEOUT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether the code is an expected, user-facing business rejection.
    pub const fn is_business_rejection(self) -> bool {
        matches!(
            self,
            Self::InsufficientXp | Self::OutOfStock | Self::RewardUnavailable
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload shared by services and adapters.
///
/// The trace identifier in scope at construction time is captured so HTTP
/// responses and logs can be correlated.
///
/// # Examples
/// ```
/// use rewards_ledger::domain::{Error, ErrorCode};
///
/// let err = Error::insufficient_xp("not enough XP");
/// assert_eq!(err.code(), ErrorCode::InsufficientXp);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    #[serde(rename = "error_code")]
    code: ErrorCode,
    #[serde(rename = "error_message")]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
}

impl Error {
    /// Create a new error, capturing the current trace identifier if any.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            trace_id: TraceId::current().map(|id| id.to_string()),
        }
    }

    /// Stable machine-readable error code.
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for adapters.
    pub const fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Correlation identifier captured when the error was raised.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use rewards_ledger::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::out_of_stock("sold out").with_details(json!({ "available_stock": 0 }));
    /// assert!(err.details().is_some());
    /// ```
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach an explicit trace identifier.
    #[must_use]
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Convenience constructor for [`ErrorCode::InvalidUser`].
    pub fn invalid_user(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidUser, message)
    }

    /// Convenience constructor for [`ErrorCode::InvalidReward`].
    pub fn invalid_reward(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidReward, message)
    }

    /// Convenience constructor for [`ErrorCode::InsufficientXp`].
    pub fn insufficient_xp(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientXp, message)
    }

    /// Convenience constructor for [`ErrorCode::OutOfStock`].
    pub fn out_of_stock(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutOfStock, message)
    }

    /// Convenience constructor for [`ErrorCode::RewardUnavailable`].
    pub fn reward_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RewardUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::IdempotencyConflict`].
    pub fn idempotency_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IdempotencyConflict, message)
    }

    /// Convenience constructor for [`ErrorCode::RedemptionFailed`].
    pub fn redemption_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RedemptionFailed, message)
    }

    /// Convenience constructor for [`ErrorCode::CouponGenerationFailed`].
    pub fn coupon_generation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CouponGenerationFailed, message)
    }

    /// Convenience constructor for [`ErrorCode::RedemptionTimeout`].
    pub fn redemption_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RedemptionTimeout, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}
