//! Builders for the persistence ports and the HTTP state.
//!
//! The same service graph is assembled over either the Diesel adapters or
//! the in-memory ledger; only the driven ports differ.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};

use rewards_ledger::domain::ports::{
    IdempotencyRepository, RedemptionHistoryRepository, RedemptionMetrics, RedemptionStore,
    RewardRepository, XpLedgerRepository,
};
use rewards_ledger::domain::{
    BalanceService, CatalogService, CouponIssuer, CouponPolicy, HistoryService,
    IdempotencyConfig, LevelCurve, RedemptionPolicy, RedemptionPorts, RedemptionService,
};
use rewards_ledger::inbound::http::state::HttpState;
use rewards_ledger::outbound::memory::MemoryLedger;
use rewards_ledger::outbound::persistence::{
    DbPool, DieselIdempotencyRepository, DieselRedemptionHistoryRepository,
    DieselRedemptionStore, DieselRewardRepository, DieselXpLedgerRepository,
};

use super::settings::AppSettings;

/// Driven ports shared by every service.
#[derive(Clone)]
pub struct LedgerPorts {
    pub ledger: Arc<dyn XpLedgerRepository>,
    pub rewards: Arc<dyn RewardRepository>,
    pub history: Arc<dyn RedemptionHistoryRepository>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
    pub store: Arc<dyn RedemptionStore>,
}

impl LedgerPorts {
    /// PostgreSQL-backed ports sharing one pool.
    pub fn diesel(pool: &DbPool, settings: &AppSettings) -> Self {
        Self {
            ledger: Arc::new(DieselXpLedgerRepository::new(pool.clone())),
            rewards: Arc::new(DieselRewardRepository::new(pool.clone())),
            history: Arc::new(DieselRedemptionHistoryRepository::new(pool.clone())),
            idempotency: Arc::new(DieselIdempotencyRepository::new(pool.clone())),
            store: Arc::new(
                DieselRedemptionStore::new(pool.clone()).with_lock_timeout(settings.lock_timeout()),
            ),
        }
    }

    /// Ports backed by one shared in-process ledger.
    pub fn memory(ledger: &MemoryLedger) -> Self {
        Self {
            ledger: Arc::new(ledger.clone()),
            rewards: Arc::new(ledger.clone()),
            history: Arc::new(ledger.clone()),
            idempotency: Arc::new(ledger.clone()),
            store: Arc::new(ledger.clone()),
        }
    }

    /// Catalog service used for startup seeding.
    pub fn catalog(&self) -> CatalogService<dyn RewardRepository> {
        CatalogService::new(Arc::clone(&self.rewards))
    }
}

/// Policy values handed to the domain services.
#[derive(Debug, Clone, Copy)]
pub struct ServicePolicies {
    pub level_curve: LevelCurve,
    pub coupons: CouponPolicy,
    pub idempotency: IdempotencyConfig,
    pub redemption: RedemptionPolicy,
}

impl ServicePolicies {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            level_curve: settings.level_curve(),
            coupons: settings.coupon_policy(),
            idempotency: settings.idempotency_config(),
            redemption: settings.redemption_policy(),
        }
    }
}

/// Assemble the driving ports consumed by the HTTP handlers.
pub(super) fn build_http_state(
    ports: &LedgerPorts,
    policies: ServicePolicies,
    metrics: Arc<dyn RedemptionMetrics>,
) -> HttpState {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let redemptions = RedemptionService::new(
        RedemptionPorts {
            ledger: Arc::clone(&ports.ledger),
            rewards: Arc::clone(&ports.rewards),
            store: Arc::clone(&ports.store),
            idempotency: Arc::clone(&ports.idempotency),
            metrics,
        },
        CouponIssuer::random(policies.coupons),
        policies.idempotency,
        policies.redemption,
        Arc::clone(&clock),
    );

    HttpState::new(
        Arc::new(BalanceService::new(
            Arc::clone(&ports.ledger),
            policies.level_curve,
            Arc::clone(&clock),
        )),
        Arc::new(ports.catalog()),
        Arc::new(redemptions),
        Arc::new(HistoryService::new(Arc::clone(&ports.history), clock)),
    )
}
