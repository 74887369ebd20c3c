//! In-process adapter implementing every persistence port.
//!
//! State sits behind one `tokio::sync::RwLock`. Reads take the shared lock.
//! A redemption unit of work owns the exclusive lock from `begin` until it
//! commits or rolls back, which serialises redemptions the way row locks do
//! in PostgreSQL (more coarsely). Used when no database URL is configured and
//! by the integration tests.

mod unit_of_work;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use tokio::sync::RwLock;

use crate::domain::ports::{
    IdempotencyRepository, IdempotencyRepositoryError, RedemptionHistoryRecord,
    RedemptionHistoryRepository, RedemptionHistoryRepositoryError, RedemptionScope,
    RedemptionStore, RedemptionStoreError, RedemptionUnitOfWork, RewardFilter, RewardRepository,
    RewardRepositoryError, XpLedgerRepository, XpLedgerRepositoryError,
};
use crate::domain::{
    Coupon, CouponCode, DailyXp, HistoryPage, IdempotencyKey, IdempotencyLookupQuery,
    IdempotencyLookupResult, IdempotencyRecord, LedgerSnapshot, PillarTotals, Redemption,
    RedemptionId, Reward, RewardId, RewardListing, UserId, XpPillar,
};

use self::unit_of_work::MemoryUnitOfWork;

#[derive(Debug, Clone)]
struct XpEvent {
    user_id: UserId,
    pillar: XpPillar,
    amount: u64,
    occurred_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    users: HashSet<UserId>,
    xp_events: Vec<XpEvent>,
    rewards: HashMap<RewardId, Reward>,
    /// Ordered by `sequence`.
    redemptions: Vec<Redemption>,
    coupons: HashMap<RedemptionId, Coupon>,
    coupon_codes: HashSet<CouponCode>,
    receipts: HashMap<(UserId, IdempotencyKey), IdempotencyRecord>,
    next_sequence: i64,
}

impl LedgerState {
    fn earned(&self, user_id: &UserId) -> (PillarTotals, Vec<DailyXp>) {
        let mut pillars = PillarTotals::default();
        let mut daily: BTreeMap<_, u64> = BTreeMap::new();
        for event in self.xp_events.iter().filter(|event| event.user_id == *user_id) {
            pillars.add(event.pillar, event.amount);
            let day = daily.entry(event.occurred_at.date_naive()).or_default();
            *day = day.saturating_add(event.amount);
        }
        let daily = daily
            .into_iter()
            .map(|(day, amount)| DailyXp { day, amount })
            .collect();
        (pillars, daily)
    }

    fn spent<'a>(user_id: &UserId, redemptions: impl IntoIterator<Item = &'a Redemption>) -> u64 {
        redemptions
            .into_iter()
            .filter(|redemption| {
                redemption.user_id == *user_id && redemption.status.debits_balance()
            })
            .fold(0_u64, |acc, redemption| acc.saturating_add(redemption.xp_spent))
    }

    fn consumed<'a>(reward_id: &RewardId, redemptions: impl IntoIterator<Item = &'a Redemption>) -> u64 {
        let count = redemptions
            .into_iter()
            .filter(|redemption| {
                redemption.reward_id == *reward_id && redemption.status.consumes_stock()
            })
            .count();
        u64::try_from(count).unwrap_or(u64::MAX)
    }

    fn listing(&self, reward: &Reward) -> RewardListing {
        RewardListing {
            reward: reward.clone(),
            consumed: Self::consumed(&reward.id, &self.redemptions),
        }
    }

    fn take_sequence(&mut self) -> i64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

/// Shared in-memory ledger. Clones share state.
#[derive(Clone)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLedger").finish_non_exhaustive()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            clock: Arc::new(DefaultClock),
        }
    }

    /// Measure receipt expiry against `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create a user profile with no activity.
    pub async fn register_user(&self, user_id: &UserId) {
        self.state.write().await.users.insert(user_id.clone());
    }

    /// Append an earning event, registering the user if needed.
    pub async fn record_xp_event(
        &self,
        user_id: &UserId,
        pillar: XpPillar,
        amount: u64,
        occurred_at: DateTime<Utc>,
    ) {
        let mut state = self.state.write().await;
        state.users.insert(user_id.clone());
        state.xp_events.push(XpEvent {
            user_id: user_id.clone(),
            pillar,
            amount,
            occurred_at,
        });
    }

    /// Every redemption belonging to `user_id`, oldest first.
    pub async fn redemptions_for(&self, user_id: &UserId) -> Vec<Redemption> {
        self.state
            .read()
            .await
            .redemptions
            .iter()
            .filter(|redemption| redemption.user_id == *user_id)
            .cloned()
            .collect()
    }

    /// Coupon issued for a redemption, if any.
    pub async fn coupon_for(&self, redemption_id: &RedemptionId) -> Option<Coupon> {
        self.state.read().await.coupons.get(redemption_id).cloned()
    }
}

#[async_trait]
impl XpLedgerRepository for MemoryLedger {
    async fn snapshot(
        &self,
        user_id: &UserId,
    ) -> Result<Option<LedgerSnapshot>, XpLedgerRepositoryError> {
        let state = self.state.read().await;
        if !state.users.contains(user_id) {
            return Ok(None);
        }
        let (earned_by_pillar, daily) = state.earned(user_id);
        Ok(Some(LedgerSnapshot {
            earned_by_pillar,
            daily,
            xp_spent: LedgerState::spent(user_id, &state.redemptions),
        }))
    }
}

#[async_trait]
impl RewardRepository for MemoryLedger {
    async fn list_active(
        &self,
        filter: &RewardFilter,
    ) -> Result<Vec<RewardListing>, RewardRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .rewards
            .values()
            .filter(|reward| reward.is_active && filter.matches(reward))
            .map(|reward| state.listing(reward))
            .collect())
    }

    async fn find_listing(
        &self,
        id: &RewardId,
    ) -> Result<Option<RewardListing>, RewardRepositoryError> {
        let state = self.state.read().await;
        Ok(state.rewards.get(id).map(|reward| state.listing(reward)))
    }

    async fn upsert(&self, reward: &Reward) -> Result<(), RewardRepositoryError> {
        self.state
            .write()
            .await
            .rewards
            .insert(reward.id, reward.clone());
        Ok(())
    }
}

#[async_trait]
impl RedemptionHistoryRepository for MemoryLedger {
    async fn list_for_user(
        &self,
        user_id: &UserId,
        page: HistoryPage,
    ) -> Result<Vec<RedemptionHistoryRecord>, RedemptionHistoryRepositoryError> {
        let state = self.state.read().await;
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        Ok(state
            .redemptions
            .iter()
            .rev()
            .filter(|redemption| redemption.user_id == *user_id)
            .filter(|redemption| page.before.is_none_or(|before| redemption.sequence < before))
            .filter_map(|redemption| {
                let reward = state.rewards.get(&redemption.reward_id)?;
                Some(RedemptionHistoryRecord {
                    redemption: redemption.clone(),
                    reward_title: reward.title.clone(),
                    reward_category: reward.category.clone(),
                    coupon: state.coupons.get(&redemption.id).cloned(),
                })
            })
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl IdempotencyRepository for MemoryLedger {
    async fn lookup(
        &self,
        query: &IdempotencyLookupQuery,
    ) -> Result<IdempotencyLookupResult, IdempotencyRepositoryError> {
        let state = self.state.read().await;
        let record = state
            .receipts
            .get(&(query.user_id.clone(), query.key.clone()))
            .cloned();
        Ok(IdempotencyLookupResult::classify(record, &query.payload_hash))
    }

    async fn cleanup_expired(&self, ttl: Duration) -> Result<u64, IdempotencyRepositoryError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|err| {
            IdempotencyRepositoryError::query(format!("idempotency ttl out of range: {err}"))
        })?;
        let cutoff = self.clock.utc() - ttl;
        let mut state = self.state.write().await;
        let before = state.receipts.len();
        state.receipts.retain(|_, record| record.created_at >= cutoff);
        Ok(u64::try_from(before - state.receipts.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl RedemptionStore for MemoryLedger {
    async fn begin(
        &self,
        scope: &RedemptionScope,
    ) -> Result<Box<dyn RedemptionUnitOfWork>, RedemptionStoreError> {
        let guard = Arc::clone(&self.state).write_owned().await;
        Ok(Box::new(MemoryUnitOfWork::new(guard, scope.clone())))
    }
}
