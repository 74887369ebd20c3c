//! In-memory service graph shared by the redemption suites.

use std::sync::Arc;

use chrono::Utc;
use mockable::{Clock, DefaultClock};
use rewards_ledger::domain::ports::{BalanceQuery, NoOpRedemptionMetrics, RewardRepository};
use rewards_ledger::domain::{
    BalanceService, CouponIssuer, CouponPolicy, HistoryService, IdempotencyConfig, LevelCurve,
    RedemptionPolicy, RedemptionPorts, RedemptionService, RedemptionStatus, Reward, RewardId,
    UserId, XpPillar,
};
use rewards_ledger::outbound::memory::MemoryLedger;

/// Services wired over one shared [`MemoryLedger`].
pub struct Ledger {
    pub memory: MemoryLedger,
    pub redemptions: RedemptionService,
    pub balances: BalanceService<MemoryLedger>,
    pub history: HistoryService<MemoryLedger>,
}

impl Ledger {
    /// Ledger issuing random coupon codes.
    pub fn new() -> Self {
        Self::with_coupons(CouponIssuer::random(CouponPolicy::default()))
    }

    /// Ledger issuing coupons through `coupons`.
    pub fn with_coupons(coupons: CouponIssuer) -> Self {
        let memory = MemoryLedger::new();
        let shared = Arc::new(memory.clone());
        let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
        let redemptions = RedemptionService::new(
            RedemptionPorts {
                ledger: shared.clone(),
                rewards: shared.clone(),
                store: shared.clone(),
                idempotency: shared.clone(),
                metrics: Arc::new(NoOpRedemptionMetrics),
            },
            coupons,
            IdempotencyConfig::default(),
            RedemptionPolicy::default(),
            Arc::clone(&clock),
        );
        Self {
            balances: BalanceService::new(shared.clone(), LevelCurve::default(), Arc::clone(&clock)),
            history: HistoryService::new(shared, clock),
            redemptions,
            memory,
        }
    }

    /// Register a user who has earned `xp` today.
    pub async fn user_with_xp(&self, xp: u64) -> UserId {
        let user_id = UserId::random();
        self.memory.register_user(&user_id).await;
        if xp > 0 {
            self.memory
                .record_xp_event(&user_id, XpPillar::Physical, xp, Utc::now())
                .await;
        }
        user_id
    }

    /// Store a reward in the catalog.
    pub async fn reward(&self, xp_cost: u64, stock_quantity: Option<u64>, is_active: bool) -> Reward {
        let reward = Reward {
            id: RewardId::random(),
            title: format!("Reward worth {xp_cost} XP"),
            description: None,
            category: "physical".to_owned(),
            partner_name: Some("Studio Calm".to_owned()),
            image_url: None,
            xp_cost,
            is_active,
            stock_quantity,
        };
        self.memory
            .upsert(&reward)
            .await
            .expect("reward should be stored");
        reward
    }

    /// Spendable XP for `user_id`.
    pub async fn xp_available(&self, user_id: &UserId) -> u64 {
        self.balances
            .balance(user_id)
            .await
            .expect("balance should load")
            .xp_available
    }

    /// Number of approved redemptions held by `user_id`.
    pub async fn approved_redemptions(&self, user_id: &UserId) -> usize {
        self.memory
            .redemptions_for(user_id)
            .await
            .iter()
            .filter(|redemption| redemption.status == RedemptionStatus::Approved)
            .count()
    }
}
