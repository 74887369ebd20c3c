//! XP balance model and the pure aggregation that derives it.
//!
//! The ledger never stores a running counter. Adapters return a
//! [`LedgerSnapshot`] (earned totals, per-day activity and the sum of approved
//! debits) and [`XpBalance::from_snapshot`] derives everything else.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Wellness pillar an earning event is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpPillar {
    Physical,
    Nutrition,
    Emotional,
    Spiritual,
}

impl XpPillar {
    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Nutrition => "nutrition",
            Self::Emotional => "emotional",
            Self::Spiritual => "spiritual",
        }
    }
}

/// Error returned when parsing an unknown pillar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown XP pillar: {0}")]
pub struct ParseXpPillarError(pub String);

impl FromStr for XpPillar {
    type Err = ParseXpPillarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical" => Ok(Self::Physical),
            "nutrition" => Ok(Self::Nutrition),
            "emotional" => Ok(Self::Emotional),
            "spiritual" => Ok(Self::Spiritual),
            other => Err(ParseXpPillarError(other.to_owned())),
        }
    }
}

impl fmt::Display for XpPillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Earned XP split by pillar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarTotals {
    pub physical: u64,
    pub nutrition: u64,
    pub emotional: u64,
    pub spiritual: u64,
}

impl PillarTotals {
    /// Add earned XP to a pillar.
    pub fn add(&mut self, pillar: XpPillar, amount: u64) {
        let slot = match pillar {
            XpPillar::Physical => &mut self.physical,
            XpPillar::Nutrition => &mut self.nutrition,
            XpPillar::Emotional => &mut self.emotional,
            XpPillar::Spiritual => &mut self.spiritual,
        };
        *slot = slot.saturating_add(amount);
    }

    /// Total earned across all pillars.
    pub const fn total(&self) -> u64 {
        self.physical
            .saturating_add(self.nutrition)
            .saturating_add(self.emotional)
            .saturating_add(self.spiritual)
    }
}

/// XP earned on a single UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyXp {
    pub day: NaiveDate,
    pub amount: u64,
}

/// Raw aggregates read from the activity ledger and redemption records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Sum of positive earning events by pillar.
    pub earned_by_pillar: PillarTotals,
    /// Positive XP per active day, in any order.
    pub daily: Vec<DailyXp>,
    /// Sum of `xp_spent` over approved redemptions.
    pub xp_spent: u64,
}

impl LedgerSnapshot {
    /// Earned minus spent, saturating at zero.
    pub const fn xp_available(&self) -> u64 {
        self.earned_by_pillar.total().saturating_sub(self.xp_spent)
    }
}

/// Deterministic mapping from earned XP to a level.
///
/// ```
/// # use rewards_ledger::domain::LevelCurve;
/// let curve = LevelCurve::default();
/// assert_eq!(curve.level(0), 1);
/// assert_eq!(curve.level(1_999), 2);
/// assert_eq!(curve.progress_pct(1_250), 25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelCurve {
    xp_per_level: NonZeroU64,
}

impl LevelCurve {
    /// Build a curve with a fixed amount of XP per level.
    pub const fn new(xp_per_level: NonZeroU64) -> Self {
        Self { xp_per_level }
    }

    /// `floor(earned / xp_per_level) + 1`.
    pub fn level(&self, xp_earned: u64) -> u64 {
        (xp_earned / self.xp_per_level).saturating_add(1)
    }

    /// Whole-number percentage toward the next level.
    pub fn progress_pct(&self, xp_earned: u64) -> u8 {
        let into_level = u128::from(xp_earned % self.xp_per_level);
        let pct = into_level * 100 / u128::from(self.xp_per_level.get());
        u8::try_from(pct).unwrap_or(100)
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::new(NonZeroU64::MIN.saturating_add(999))
    }
}

/// Current and longest runs of consecutive active days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

/// Compute streaks from active days.
///
/// The current streak is the run ending today or yesterday; a gap of more
/// than one day resets it to zero. Days after `today` are ignored.
pub fn compute_streaks(days: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> Streaks {
    let mut active: Vec<NaiveDate> = days.into_iter().filter(|day| *day <= today).collect();
    active.sort_unstable();
    active.dedup();

    let mut longest = 0_u32;
    let mut run = 0_u32;
    let mut previous: Option<NaiveDate> = None;
    for day in &active {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(*day) => run.saturating_add(1),
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    let yesterday = today.pred_opt();
    let current = match previous {
        Some(last) if last == today || Some(last) == yesterday => run,
        _ => 0,
    };
    Streaks { current, longest }
}

fn earned_since(daily: &[DailyXp], today: NaiveDate, window_days: u64) -> u64 {
    let Some(start) = today.checked_sub_days(Days::new(window_days.saturating_sub(1))) else {
        return daily.iter().map(|entry| entry.amount).sum();
    };
    daily
        .iter()
        .filter(|entry| entry.day >= start && entry.day <= today)
        .fold(0_u64, |acc, entry| acc.saturating_add(entry.amount))
}

/// Spendable balance and derived statistics for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XpBalance {
    pub user_id: UserId,
    pub xp_earned: u64,
    pub xp_spent: u64,
    pub xp_available: u64,
    pub level: u64,
    pub progress_pct: u8,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub xp_7d: u64,
    pub xp_30d: u64,
    pub pillars: PillarTotals,
}

impl XpBalance {
    /// Derive the balance from a ledger snapshot.
    ///
    /// `xp_available` saturates at zero; the orchestrator refuses any debit
    /// that would take it below.
    pub fn from_snapshot(
        user_id: UserId,
        snapshot: &LedgerSnapshot,
        curve: LevelCurve,
        today: NaiveDate,
    ) -> Self {
        let xp_earned = snapshot.earned_by_pillar.total();
        let streaks = compute_streaks(snapshot.daily.iter().map(|entry| entry.day), today);
        Self {
            user_id,
            xp_earned,
            xp_spent: snapshot.xp_spent,
            xp_available: snapshot.xp_available(),
            level: curve.level(xp_earned),
            progress_pct: curve.progress_pct(xp_earned),
            current_streak: streaks.current,
            longest_streak: streaks.longest,
            xp_7d: earned_since(&snapshot.daily, today, 7),
            xp_30d: earned_since(&snapshot.daily, today, 30),
            pillars: snapshot.earned_by_pillar,
        }
    }
}
