//! Coupon codes, lifecycle and issuance.
//!
//! Codes are sixteen characters drawn from an alphabet without visually
//! ambiguous glyphs (`0/O`, `1/I/L`), printed as four dash-separated groups:
//! `ABCD-EFGH-JKMN-PQRS`. With 31 symbols the space holds roughly 7e23 codes;
//! uniqueness is still enforced by the store and retried on collision.

use std::fmt;
use std::num::NonZeroU8;
use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RedemptionId;

/// Symbols a coupon code may contain.
pub const COUPON_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
/// Characters per dash-separated group.
pub const COUPON_GROUP_LEN: usize = 4;
/// Number of groups in a code.
pub const COUPON_GROUPS: usize = 4;

/// Error returned when a string is not a well-formed coupon code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed coupon code: {0}")]
pub struct CouponCodeError(pub String);

/// Human-typeable coupon code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Validate a code read back from storage or user input.
    ///
    /// ```
    /// # use rewards_ledger::domain::CouponCode;
    /// assert!(CouponCode::parse("ABCD-EFGH-JKMN-PQRS").is_ok());
    /// assert!(CouponCode::parse("ABCD-EFGH-JKMN-PQR0").is_err());
    /// assert!(CouponCode::parse("ABCDEFGHJKMNPQRS").is_err());
    /// ```
    pub fn parse(raw: impl Into<String>) -> Result<Self, CouponCodeError> {
        let raw = raw.into();
        let groups: Vec<&str> = raw.split('-').collect();
        let well_formed = groups.len() == COUPON_GROUPS
            && groups.iter().all(|group| {
                group.len() == COUPON_GROUP_LEN
                    && group.bytes().all(|byte| COUPON_ALPHABET.contains(&byte))
            });
        if well_formed {
            Ok(Self(raw))
        } else {
            Err(CouponCodeError(raw))
        }
    }

    /// Borrow the code as text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CouponCode> for String {
    fn from(value: CouponCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Source of fresh coupon codes.
#[cfg_attr(test, mockall::automock)]
pub trait CouponCodeGenerator: Send + Sync {
    /// Produce a new candidate code. Uniqueness is checked by the store.
    fn generate(&self) -> CouponCode;
}

/// Generator backed by the thread-local CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCouponCodes;

impl CouponCodeGenerator for RandomCouponCodes {
    fn generate(&self) -> CouponCode {
        let mut rng = rand::thread_rng();
        let mut code = String::with_capacity(COUPON_GROUPS * (COUPON_GROUP_LEN + 1));
        for group in 0..COUPON_GROUPS {
            if group > 0 {
                code.push('-');
            }
            code.extend(
                (0..COUPON_GROUP_LEN)
                    .filter_map(|_| COUPON_ALPHABET.choose(&mut rng).copied().map(char::from)),
            );
        }
        CouponCode(code)
    }
}

/// Read-time state of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Valid,
    Used,
    Expired,
}

impl CouponStatus {
    /// Stable wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }
}

/// Coupon bound one-to-one to a redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    pub id: Uuid,
    pub redemption_id: RedemptionId,
    pub code: CouponCode,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Whether the coupon has been consumed at point of use.
    pub const fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Status computed from `expires_at` at read time; no sweep is involved.
    pub fn status_at(&self, now: DateTime<Utc>) -> CouponStatus {
        if self.is_used() {
            CouponStatus::Used
        } else if now >= self.expires_at {
            CouponStatus::Expired
        } else {
            CouponStatus::Valid
        }
    }
}

/// Validity window and retry bound for coupon issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponPolicy {
    validity_days: u32,
    max_attempts: NonZeroU8,
}

impl CouponPolicy {
    const DEFAULT_VALIDITY_DAYS: u32 = 30;
    const DEFAULT_MAX_ATTEMPTS: u8 = 5;

    /// Build a policy; a zero attempt bound is raised to one.
    pub fn new(validity_days: u32, max_attempts: u8) -> Self {
        Self {
            validity_days,
            max_attempts: NonZeroU8::new(max_attempts).unwrap_or(NonZeroU8::MIN),
        }
    }

    /// Days a coupon stays valid after issue.
    pub const fn validity_days(&self) -> u32 {
        self.validity_days
    }

    /// Insert attempts before giving up on a unique code.
    pub const fn max_attempts(&self) -> u8 {
        self.max_attempts.get()
    }

    /// `issued_at + validity window`.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at
            .checked_add_days(Days::new(u64::from(self.validity_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for CouponPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VALIDITY_DAYS, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Issues coupons for committed redemptions.
#[derive(Clone)]
pub struct CouponIssuer {
    generator: Arc<dyn CouponCodeGenerator>,
    policy: CouponPolicy,
}

impl CouponIssuer {
    /// Create an issuer from a code source and policy.
    pub fn new(generator: Arc<dyn CouponCodeGenerator>, policy: CouponPolicy) -> Self {
        Self { generator, policy }
    }

    /// Issuer using [`RandomCouponCodes`].
    pub fn random(policy: CouponPolicy) -> Self {
        Self::new(Arc::new(RandomCouponCodes), policy)
    }

    /// The policy this issuer applies.
    pub const fn policy(&self) -> CouponPolicy {
        self.policy
    }

    /// Build a fresh coupon for `redemption_id` with a newly generated code.
    pub fn issue(&self, redemption_id: RedemptionId, issued_at: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            redemption_id,
            code: self.generator.generate(),
            issued_at,
            expires_at: self.policy.expires_at(issued_at),
            used_at: None,
        }
    }
}

impl fmt::Debug for CouponIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouponIssuer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use std::collections::HashSet;

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    fn generated_codes_are_well_formed() {
        let generator = RandomCouponCodes;
        for _ in 0..1_000 {
            let code = generator.generate();
            assert!(CouponCode::parse(code.as_str()).is_ok(), "bad code {code}");
            assert_eq!(code.as_str().len(), 19);
        }
    }

    #[rstest]
    fn alphabet_excludes_ambiguous_characters() {
        for ambiguous in [b'0', b'O', b'1', b'I', b'L'] {
            assert!(!COUPON_ALPHABET.contains(&ambiguous));
        }
        assert_eq!(COUPON_ALPHABET.len(), 31);
    }

    #[rstest]
    fn one_hundred_thousand_codes_are_unique() {
        let generator = RandomCouponCodes;
        let codes: HashSet<CouponCode> = (0..100_000).map(|_| generator.generate()).collect();
        assert_eq!(codes.len(), 100_000);
    }

    #[rstest]
    fn issue_applies_validity_window() {
        let issuer = CouponIssuer::random(CouponPolicy::default());
        let redemption_id = RedemptionId::random();
        let coupon = issuer.issue(redemption_id, issued_at());

        assert_eq!(coupon.redemption_id, redemption_id);
        assert_eq!(coupon.expires_at - coupon.issued_at, chrono::Duration::days(30));
        assert!(!coupon.is_used());
    }

    #[rstest]
    #[case(chrono::Duration::days(29), None, CouponStatus::Valid)]
    #[case(chrono::Duration::days(30), None, CouponStatus::Expired)]
    #[case(chrono::Duration::days(45), None, CouponStatus::Expired)]
    #[case(chrono::Duration::days(45), Some(chrono::Duration::days(1)), CouponStatus::Used)]
    fn status_is_computed_at_read_time(
        #[case] elapsed: chrono::Duration,
        #[case] used_after: Option<chrono::Duration>,
        #[case] expected: CouponStatus,
    ) {
        let mut coupon = CouponIssuer::random(CouponPolicy::default())
            .issue(RedemptionId::random(), issued_at());
        coupon.used_at = used_after.map(|delta| issued_at() + delta);
        assert_eq!(coupon.status_at(issued_at() + elapsed), expected);
    }

    #[rstest]
    fn zero_attempts_are_raised_to_one() {
        assert_eq!(CouponPolicy::new(30, 0).max_attempts(), 1);
    }

    #[rstest]
    fn issuer_uses_injected_generator() {
        let mut generator = MockCouponCodeGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|| CouponCode::parse("AAAA-BBBB-CCCC-DDDD").expect("fixture code"));
        let issuer = CouponIssuer::new(Arc::new(generator), CouponPolicy::new(7, 3));

        let coupon = issuer.issue(RedemptionId::random(), issued_at());
        assert_eq!(coupon.code.as_str(), "AAAA-BBBB-CCCC-DDDD");
        assert_eq!(coupon.expires_at - coupon.issued_at, chrono::Duration::days(7));
    }
}
