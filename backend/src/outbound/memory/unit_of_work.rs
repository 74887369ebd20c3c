//! Unit of work over the exclusively locked in-memory state.

use async_trait::async_trait;
use tokio::sync::OwnedRwLockWriteGuard;

use crate::domain::ports::{
    CouponInsert, RedemptionScope, RedemptionSnapshot, RedemptionStoreError, RedemptionUnitOfWork,
};
use crate::domain::{
    Coupon, IdempotencyLookupQuery, IdempotencyLookupResult, IdempotencyRecord, NewRedemption,
    Redemption, RedemptionId, RedemptionStatus, RewardListing,
};

use super::LedgerState;

/// Changes recorded by a unit of work, applied on commit.
#[derive(Debug, Default)]
struct Staged {
    redemptions: Vec<Redemption>,
    cancelled: Vec<RedemptionId>,
    coupons: Vec<Coupon>,
    receipts: Vec<IdempotencyRecord>,
}

pub(super) struct MemoryUnitOfWork {
    guard: Option<OwnedRwLockWriteGuard<LedgerState>>,
    scope: RedemptionScope,
    staged: Staged,
}

impl MemoryUnitOfWork {
    pub(super) fn new(guard: OwnedRwLockWriteGuard<LedgerState>, scope: RedemptionScope) -> Self {
        Self {
            guard: Some(guard),
            scope,
            staged: Staged::default(),
        }
    }

    fn state(&mut self) -> Result<&mut LedgerState, RedemptionStoreError> {
        self.guard
            .as_deref_mut()
            .ok_or_else(|| RedemptionStoreError::query("unit of work already finished"))
    }

    /// Committed redemptions overlaid with staged inserts and cancellations.
    fn effective_redemptions<'a>(
        state: &'a LedgerState,
        staged: &'a Staged,
    ) -> impl Iterator<Item = Redemption> + 'a {
        state
            .redemptions
            .iter()
            .chain(staged.redemptions.iter())
            .cloned()
            .map(|mut redemption| {
                if staged.cancelled.contains(&redemption.id) {
                    redemption.status = RedemptionStatus::Cancelled;
                }
                redemption
            })
    }
}

#[async_trait]
impl RedemptionUnitOfWork for MemoryUnitOfWork {
    async fn lookup_receipt(
        &mut self,
        query: &IdempotencyLookupQuery,
    ) -> Result<IdempotencyLookupResult, RedemptionStoreError> {
        let staged = self
            .staged
            .receipts
            .iter()
            .find(|record| record.user_id == query.user_id && record.key == query.key)
            .cloned();
        let state = self.state()?;
        let record = staged.or_else(|| {
            state
                .receipts
                .get(&(query.user_id.clone(), query.key.clone()))
                .cloned()
        });
        Ok(IdempotencyLookupResult::classify(record, &query.payload_hash))
    }

    async fn load_snapshot(&mut self) -> Result<RedemptionSnapshot, RedemptionStoreError> {
        let state = self
            .guard
            .as_deref()
            .ok_or_else(|| RedemptionStoreError::query("unit of work already finished"))?;
        let redemptions: Vec<Redemption> =
            Self::effective_redemptions(state, &self.staged).collect();
        let user_id = &self.scope.user_id;
        let xp_available = state.users.contains(user_id).then(|| {
            let (earned, _) = state.earned(user_id);
            earned
                .total()
                .saturating_sub(LedgerState::spent(user_id, &redemptions))
        });
        let reward = state
            .rewards
            .get(&self.scope.reward_id)
            .map(|reward| RewardListing {
                reward: reward.clone(),
                consumed: LedgerState::consumed(&reward.id, &redemptions),
            });
        Ok(RedemptionSnapshot {
            xp_available,
            reward,
        })
    }

    async fn insert_redemption(
        &mut self,
        redemption: &NewRedemption,
    ) -> Result<Redemption, RedemptionStoreError> {
        let sequence = self.state()?.take_sequence();
        let stored = Redemption {
            id: redemption.id,
            user_id: redemption.user_id.clone(),
            reward_id: redemption.reward_id,
            xp_spent: redemption.xp_spent,
            status: redemption.status,
            sequence,
            created_at: redemption.created_at,
            delivery_info: redemption.delivery_info.clone(),
        };
        self.staged.redemptions.push(stored.clone());
        Ok(stored)
    }

    async fn insert_coupon(
        &mut self,
        coupon: &Coupon,
    ) -> Result<CouponInsert, RedemptionStoreError> {
        let staged_taken = self
            .staged
            .coupons
            .iter()
            .any(|staged| staged.code == coupon.code);
        if staged_taken || self.state()?.coupon_codes.contains(&coupon.code) {
            return Ok(CouponInsert::CodeTaken);
        }
        self.staged.coupons.push(coupon.clone());
        Ok(CouponInsert::Inserted)
    }

    async fn cancel_redemption(&mut self, id: &RedemptionId) -> Result<(), RedemptionStoreError> {
        if let Some(staged) = self
            .staged
            .redemptions
            .iter_mut()
            .find(|redemption| redemption.id == *id)
        {
            staged.status = RedemptionStatus::Cancelled;
            return Ok(());
        }
        if !self.state()?.redemptions.iter().any(|redemption| redemption.id == *id) {
            return Err(RedemptionStoreError::query(format!(
                "redemption {id} does not exist"
            )));
        }
        self.staged.cancelled.push(*id);
        Ok(())
    }

    async fn store_receipt(
        &mut self,
        record: &IdempotencyRecord,
    ) -> Result<(), RedemptionStoreError> {
        self.staged.receipts.push(record.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), RedemptionStoreError> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| RedemptionStoreError::query("unit of work already finished"))?;
        let staged = std::mem::take(&mut self.staged);
        for redemption in &mut guard.redemptions {
            if staged.cancelled.contains(&redemption.id) {
                redemption.status = RedemptionStatus::Cancelled;
            }
        }
        guard.redemptions.extend(staged.redemptions);
        for coupon in staged.coupons {
            guard.coupon_codes.insert(coupon.code.clone());
            guard.coupons.insert(coupon.redemption_id, coupon);
        }
        for record in staged.receipts {
            guard
                .receipts
                .insert((record.user_id.clone(), record.key.clone()), record);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), RedemptionStoreError> {
        self.staged = Staged::default();
        self.guard = None;
        Ok(())
    }
}
