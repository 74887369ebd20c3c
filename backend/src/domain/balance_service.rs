//! Balance aggregator implementing the [`BalanceQuery`] driving port.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;

use crate::domain::port_error_mapping::map_ledger_error;
use crate::domain::ports::{BalanceQuery, XpLedgerRepository};
use crate::domain::{Error, LevelCurve, UserId, XpBalance};

/// Read-only balance service. Holds no locks and writes nothing.
#[derive(Clone)]
pub struct BalanceService<R: ?Sized> {
    ledger: Arc<R>,
    curve: LevelCurve,
    clock: Arc<dyn Clock>,
}

impl<R: ?Sized> BalanceService<R> {
    /// Create a balance service over a ledger repository.
    pub fn new(ledger: Arc<R>, curve: LevelCurve, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            curve,
            clock,
        }
    }
}

#[async_trait]
impl<R> BalanceQuery for BalanceService<R>
where
    R: XpLedgerRepository + ?Sized,
{
    async fn balance(&self, user_id: &UserId) -> Result<XpBalance, Error> {
        let snapshot = self
            .ledger
            .snapshot(user_id)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::invalid_user(format!("user {user_id} not found")))?;
        let today = self.clock.utc().date_naive();
        Ok(XpBalance::from_snapshot(
            user_id.clone(),
            &snapshot,
            self.curve,
            today,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockXpLedgerRepository, XpLedgerRepositoryError};
    use crate::domain::{DailyXp, ErrorCode, LedgerSnapshot, PillarTotals, XpPillar};
    use crate::domain::fixture_clock::FixtureClock;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn clock_at(day: NaiveDate) -> Arc<dyn Clock> {
        FixtureClock::at(day.and_hms_opt(9, 0, 0).expect("valid time").and_utc())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).expect("valid date")
    }

    #[rstest]
    #[tokio::test]
    async fn balance_is_derived_from_snapshot() {
        let mut ledger = MockXpLedgerRepository::new();
        ledger.expect_snapshot().times(1).returning(|_| {
            let mut pillars = PillarTotals::default();
            pillars.add(XpPillar::Physical, 1_200);
            Ok(Some(LedgerSnapshot {
                earned_by_pillar: pillars,
                daily: vec![
                    DailyXp { day: day(10), amount: 700 },
                    DailyXp { day: day(9), amount: 500 },
                ],
                xp_spent: 1_000,
            }))
        });
        let service = BalanceService::new(Arc::new(ledger), LevelCurve::default(), clock_at(day(10)));

        let balance = service
            .balance(&UserId::random())
            .await
            .expect("balance computed");

        assert_eq!(balance.xp_available, 200);
        assert_eq!(balance.xp_earned, 1_200);
        assert_eq!(balance.level, 2);
        assert_eq!(balance.current_streak, 2);
        assert_eq!(balance.xp_7d, 1_200);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_user_is_invalid_user() {
        let mut ledger = MockXpLedgerRepository::new();
        ledger.expect_snapshot().times(1).returning(|_| Ok(None));
        let service = BalanceService::new(Arc::new(ledger), LevelCurve::default(), clock_at(day(1)));

        let err = service
            .balance(&UserId::random())
            .await
            .expect_err("unknown user rejected");
        assert_eq!(err.code(), ErrorCode::InvalidUser);
    }

    #[rstest]
    #[tokio::test]
    async fn ledger_outage_is_service_unavailable() {
        let mut ledger = MockXpLedgerRepository::new();
        ledger
            .expect_snapshot()
            .times(1)
            .returning(|_| Err(XpLedgerRepositoryError::connection("pool timed out")));
        let service = BalanceService::new(Arc::new(ledger), LevelCurve::default(), clock_at(day(1)));

        let err = service
            .balance(&UserId::random())
            .await
            .expect_err("outage surfaces");
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}
