//! Redemption records, receipts and the orchestrator request shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CouponCode, CouponStatus, IdempotencyKey, RewardId, UserId};

/// Identifier of a redemption row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedemptionId(Uuid);

impl RedemptionId {
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

impl fmt::Display for RedemptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a redemption.
///
/// Redemptions are created directly as `Approved` inside the orchestrator's
/// transaction; `Cancelled` is the compensating state. `Pending` exists so
/// externally written rows can be read back, but the engine never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Cancelled,
}

impl RedemptionStatus {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the row consumes a unit of finite stock.
    pub const fn consumes_stock(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether the row's `xp_spent` counts against the balance.
    pub const fn debits_balance(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Error returned when parsing an unknown status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown redemption status: {0}")]
pub struct ParseRedemptionStatusError(pub String);

impl FromStr for RedemptionStatus {
    type Err = ParseRedemptionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseRedemptionStatusError(other.to_owned())),
        }
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional fulfilment details for physical rewards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DeliveryInfo {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.email.is_none() && self.phone.is_none() && self.notes.is_none()
    }
}

/// Row the orchestrator asks the store to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRedemption {
    pub id: RedemptionId,
    pub user_id: UserId,
    pub reward_id: RewardId,
    /// Cost captured at redemption time; never rewritten.
    pub xp_spent: u64,
    pub status: RedemptionStatus,
    pub created_at: DateTime<Utc>,
    pub delivery_info: Option<DeliveryInfo>,
}

/// Persisted redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub id: RedemptionId,
    pub user_id: UserId,
    pub reward_id: RewardId,
    pub xp_spent: u64,
    pub status: RedemptionStatus,
    /// Commit-ordered position, monotonically increasing across the store.
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub delivery_info: Option<DeliveryInfo>,
}

/// Redemption summary embedded in a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemedReward {
    pub id: RedemptionId,
    pub status: RedemptionStatus,
    pub coupon_code: CouponCode,
    pub expires_at: DateTime<Utc>,
    pub reward_title: String,
}

/// Success payload of a redemption.
///
/// The serialised form is stored verbatim as the idempotency snapshot and
/// replayed unchanged on retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub redemption: RedeemedReward,
    pub user_xp_after: u64,
}

/// Receipt plus whether it came from a previously committed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionOutcome {
    pub receipt: RedemptionReceipt,
    pub replayed: bool,
}

/// Input to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemRequest {
    pub user_id: UserId,
    pub reward_id: RewardId,
    pub idempotency_key: Option<IdempotencyKey>,
    pub delivery_info: Option<DeliveryInfo>,
}

impl RedeemRequest {
    /// Request without an idempotency key or delivery info.
    pub const fn new(user_id: UserId, reward_id: RewardId) -> Self {
        Self {
            user_id,
            reward_id,
            idempotency_key: None,
            delivery_info: None,
        }
    }

    /// Attach a caller-supplied idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Attach delivery details; empty details are dropped.
    #[must_use]
    pub fn with_delivery_info(mut self, info: DeliveryInfo) -> Self {
        self.delivery_info = (!info.is_empty()).then_some(info);
        self
    }
}

/// One entry of a user's redemption history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionHistoryEntry {
    pub id: RedemptionId,
    pub reward_id: RewardId,
    pub reward_title: String,
    pub reward_category: String,
    /// Snapshot cost; authoritative even if the reward has been repriced.
    pub xp_spent: u64,
    pub status: RedemptionStatus,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub coupon_code: Option<CouponCode>,
    pub coupon_expires_at: Option<DateTime<Utc>>,
    pub coupon_status: Option<CouponStatus>,
}

/// Page request for history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPage {
    pub limit: u32,
    /// Only entries with a smaller `sequence` are returned.
    pub before: Option<i64>,
}

impl HistoryPage {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 50;
    /// Largest page size a caller may request.
    pub const MAX_LIMIT: u32 = 200;

    /// Build a page, clamping the limit into `1..=MAX_LIMIT`.
    pub fn new(limit: Option<u32>, before: Option<i64>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            before,
        }
    }
}

impl Default for HistoryPage {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RedemptionStatus::Pending, true, false)]
    #[case(RedemptionStatus::Approved, true, true)]
    #[case(RedemptionStatus::Cancelled, false, false)]
    fn status_accounting(
        #[case] status: RedemptionStatus,
        #[case] consumes: bool,
        #[case] debits: bool,
    ) {
        assert_eq!(status.consumes_stock(), consumes);
        assert_eq!(status.debits_balance(), debits);
        assert_eq!(status.as_str().parse::<RedemptionStatus>(), Ok(status));
    }

    #[rstest]
    #[case(None, 50)]
    #[case(Some(0), 1)]
    #[case(Some(75), 75)]
    #[case(Some(10_000), 200)]
    fn history_page_clamps_limit(#[case] limit: Option<u32>, #[case] expected: u32) {
        assert_eq!(HistoryPage::new(limit, None).limit, expected);
    }

    #[rstest]
    fn empty_delivery_info_is_dropped() {
        let request = RedeemRequest::new(UserId::random(), RewardId::random())
            .with_delivery_info(DeliveryInfo::default());
        assert!(request.delivery_info.is_none());

        let request = RedeemRequest::new(UserId::random(), RewardId::random())
            .with_delivery_info(DeliveryInfo {
                email: Some("ada@example.com".to_owned()),
                ..DeliveryInfo::default()
            });
        assert!(request.delivery_info.is_some());
    }

    #[rstest]
    fn receipt_serialises_with_wire_field_names() {
        let receipt = RedemptionReceipt {
            redemption: RedeemedReward {
                id: RedemptionId::from_uuid(Uuid::nil()),
                status: RedemptionStatus::Approved,
                coupon_code: CouponCode::parse("ABCD-EFGH-JKMN-PQRS").expect("fixture code"),
                expires_at: DateTime::<Utc>::UNIX_EPOCH,
                reward_title: "Yoga class".to_owned(),
            },
            user_xp_after: 200,
        };
        let value = serde_json::to_value(&receipt).expect("serialise receipt");
        assert_eq!(value["user_xp_after"], 200);
        assert_eq!(value["redemption"]["status"], "approved");
        assert_eq!(value["redemption"]["coupon_code"], "ABCD-EFGH-JKMN-PQRS");

        let back: RedemptionReceipt = serde_json::from_value(value).expect("deserialise receipt");
        assert_eq!(back, receipt);
    }
}
