//! Pure redemption eligibility rules.
//!
//! [`evaluate`] is shared by the advisory validate operation and by the
//! orchestrator, which re-runs it against the locked snapshot inside its
//! transaction. Keeping a single rule set means the two can never disagree on
//! check order.

use serde_json::json;

use super::{Error, RewardListing, StockLevel};

/// Business rule that blocked a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    RewardUnavailable,
    OutOfStock,
    InsufficientXp,
}

impl RejectionReason {
    /// Human-readable explanation suitable for display.
    pub const fn message(self) -> &'static str {
        match self {
            Self::RewardUnavailable => "reward is not available",
            Self::OutOfStock => "reward is out of stock",
            Self::InsufficientXp => "insufficient XP to redeem this reward",
        }
    }
}

/// Observed values and verdict for one user/reward pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionCheck {
    pub rejection: Option<RejectionReason>,
    pub user_xp: u64,
    pub reward_cost: Option<u64>,
    pub available_stock: Option<StockLevel>,
}

impl RedemptionCheck {
    /// Whether every rule passed.
    pub const fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }

    /// Convert a rejection into the matching domain error, carrying the
    /// observed values as details. Returns `None` when the check passed.
    pub fn to_error(&self) -> Option<Error> {
        let reason = self.rejection?;
        let details = json!({
            "user_xp": self.user_xp,
            "reward_cost": self.reward_cost,
            "available_stock": self.available_stock.and_then(StockLevel::as_option),
        });
        let error = match reason {
            RejectionReason::RewardUnavailable => Error::reward_unavailable(reason.message()),
            RejectionReason::OutOfStock => Error::out_of_stock(reason.message()),
            RejectionReason::InsufficientXp => Error::insufficient_xp(reason.message()),
        };
        Some(error.with_details(details))
    }
}

/// Apply the eligibility rules in order: availability, stock, then XP.
///
/// ```
/// # use rewards_ledger::domain::{evaluate, RejectionReason};
/// let check = evaluate(500, None);
/// assert_eq!(check.rejection, Some(RejectionReason::RewardUnavailable));
/// ```
pub fn evaluate(xp_available: u64, listing: Option<&RewardListing>) -> RedemptionCheck {
    let Some(listing) = listing else {
        return RedemptionCheck {
            rejection: Some(RejectionReason::RewardUnavailable),
            user_xp: xp_available,
            reward_cost: None,
            available_stock: None,
        };
    };

    let stock = listing.available_stock();
    let cost = listing.reward.xp_cost;
    let rejection = if !listing.reward.is_active {
        Some(RejectionReason::RewardUnavailable)
    } else if !stock.has_units() {
        Some(RejectionReason::OutOfStock)
    } else if xp_available < cost {
        Some(RejectionReason::InsufficientXp)
    } else {
        None
    };

    RedemptionCheck {
        rejection,
        user_xp: xp_available,
        reward_cost: Some(cost),
        available_stock: Some(stock),
    }
}
