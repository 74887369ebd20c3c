//! Reward catalog entries and derived stock levels.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors for reward identifiers and definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewardValidationError {
    #[error("reward id must be a valid UUID")]
    InvalidId,
    #[error("reward title must not be empty")]
    EmptyTitle,
    #[error("reward category must not be empty")]
    EmptyCategory,
    #[error("reward xp_cost must be positive")]
    NonPositiveCost,
}

/// Catalog identifier for a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardId(Uuid);

impl RewardId {
    /// Parse a reward identifier from its string form.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, RewardValidationError> {
        Uuid::parse_str(raw.as_ref())
            .map(Self)
            .map_err(|_| RewardValidationError::InvalidId)
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Redeemable catalog entry.
///
/// `stock_quantity` of `None` means unlimited. The cost is a positive integer
/// and is copied onto each redemption, so later price changes never rewrite
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub partner_name: Option<String>,
    pub image_url: Option<String>,
    pub xp_cost: u64,
    pub is_active: bool,
    pub stock_quantity: Option<u64>,
}

impl Reward {
    /// Check the invariants a catalog entry must satisfy before it is stored.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), RewardValidationError> {
        if self.title.trim().is_empty() {
            return Err(RewardValidationError::EmptyTitle);
        }
        if self.category.trim().is_empty() {
            return Err(RewardValidationError::EmptyCategory);
        }
        if self.xp_cost == 0 {
            return Err(RewardValidationError::NonPositiveCost);
        }
        Ok(())
    }
}

/// Remaining units of a reward at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    Unlimited,
    Finite(u64),
}

impl StockLevel {
    /// Whether at least one unit can still be redeemed.
    pub const fn has_units(self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Finite(remaining) => remaining > 0,
        }
    }

    /// `None` for unlimited stock, otherwise the remaining count.
    pub const fn as_option(self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Finite(remaining) => Some(remaining),
        }
    }
}

/// Reward paired with the number of non-cancelled redemptions against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardListing {
    pub reward: Reward,
    pub consumed: u64,
}

impl RewardListing {
    /// `stock_quantity - consumed` for finite rewards, saturating at zero.
    ///
    /// ```
    /// # use rewards_ledger::domain::{Reward, RewardId, RewardListing, StockLevel};
    /// let reward = Reward {
    ///     id: RewardId::random(),
    ///     title: "Yoga class".into(),
    ///     description: None,
    ///     category: "physical".into(),
    ///     partner_name: None,
    ///     image_url: None,
    ///     xp_cost: 500,
    ///     is_active: true,
    ///     stock_quantity: Some(3),
    /// };
    /// let listing = RewardListing { reward, consumed: 1 };
    /// assert_eq!(listing.available_stock(), StockLevel::Finite(2));
    /// ```
    pub fn available_stock(&self) -> StockLevel {
        match self.reward.stock_quantity {
            None => StockLevel::Unlimited,
            Some(total) => StockLevel::Finite(total.saturating_sub(self.consumed)),
        }
    }
}
