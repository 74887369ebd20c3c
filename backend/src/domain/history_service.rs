//! Redemption history implementing [`RedemptionHistoryQuery`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;

use crate::domain::port_error_mapping::map_history_error;
use crate::domain::ports::{
    RedemptionHistoryQuery, RedemptionHistoryRecord, RedemptionHistoryRepository,
};
use crate::domain::{Error, HistoryPage, RedemptionHistoryEntry, UserId};

/// Read-only history service.
#[derive(Clone)]
pub struct HistoryService<R: ?Sized> {
    history: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ?Sized> HistoryService<R> {
    /// Create a history service over a history repository.
    pub fn new(history: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { history, clock }
    }
}

fn to_entry(record: RedemptionHistoryRecord, now: DateTime<Utc>) -> RedemptionHistoryEntry {
    let RedemptionHistoryRecord {
        redemption,
        reward_title,
        reward_category,
        coupon,
    } = record;
    let coupon_status = coupon.as_ref().map(|coupon| coupon.status_at(now));
    let coupon_expires_at = coupon.as_ref().map(|coupon| coupon.expires_at);
    RedemptionHistoryEntry {
        id: redemption.id,
        reward_id: redemption.reward_id,
        reward_title,
        reward_category,
        xp_spent: redemption.xp_spent,
        status: redemption.status,
        sequence: redemption.sequence,
        created_at: redemption.created_at,
        coupon_code: coupon.map(|coupon| coupon.code),
        coupon_expires_at,
        coupon_status,
    }
}

#[async_trait]
impl<R> RedemptionHistoryQuery for HistoryService<R>
where
    R: RedemptionHistoryRepository + ?Sized,
{
    async fn list_redemptions(
        &self,
        user_id: &UserId,
        page: HistoryPage,
    ) -> Result<Vec<RedemptionHistoryEntry>, Error> {
        let records = self
            .history
            .list_for_user(user_id, page)
            .await
            .map_err(map_history_error)?;
        let now = self.clock.utc();
        Ok(records
            .into_iter()
            .map(|record| to_entry(record, now))
            .collect())
    }
}
