//! Redemption persistence against embedded PostgreSQL.
//!
//! Runs the redemption races and the read-side queries through the Diesel
//! adapters, where row locks rather than the in-process lock serialise
//! concurrent units of work.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, Utc};
use futures::future::join_all;
use mockable::{Clock, DefaultClock};
use pg_embedded_setup_unpriv::TemporaryDatabase;
use postgres::{Client, NoTls};
use rewards_ledger::domain::ports::{
    IdempotencyRepository, NoOpRedemptionMetrics, RedemptionCommand, RedemptionHistoryRepository,
    RedemptionScope, RedemptionStore, RewardFilter, RewardRepository, XpLedgerRepository,
};
use rewards_ledger::domain::{
    CouponIssuer, CouponPolicy, Error, ErrorCode, HistoryPage, IdempotencyConfig, IdempotencyKey,
    NewRedemption, RedeemRequest, RedemptionId, RedemptionOutcome, RedemptionPolicy,
    RedemptionPorts, RedemptionService, RedemptionStatus, Reward, RewardId, UserId,
};
use rewards_ledger::outbound::persistence::{
    DbPool, DieselIdempotencyRepository, DieselRedemptionHistoryRepository, DieselRedemptionStore,
    DieselRewardRepository, DieselXpLedgerRepository, PoolConfig,
};
use rstest::{fixture, rstest};
use tokio::runtime::Runtime;

#[path = "support/cluster_skip.rs"]
mod cluster_skip;
#[path = "support/embedded_postgres.rs"]
mod embedded_postgres;

use cluster_skip::handle_cluster_setup_failure;
use embedded_postgres::{provision_template_database, shared_cluster};

/// Clock running a fixed offset ahead of the system time.
struct ShiftedClock(TimeDelta);

impl Clock for ShiftedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        Utc::now() + self.0
    }
}

/// Diesel adapters and a redemption service over one temporary database.
struct PgLedger {
    runtime: Runtime,
    database_url: String,
    pool: DbPool,
    redemptions: Arc<RedemptionService>,
    rewards: DieselRewardRepository,
    ledger: DieselXpLedgerRepository,
    history: DieselRedemptionHistoryRepository,
    _database: TemporaryDatabase,
}

impl PgLedger {
    fn connect(&self) -> Client {
        Client::connect(&self.database_url, NoTls).expect("seed connection")
    }

    /// Insert a profile holding `xp` physical XP. Call outside the runtime.
    fn user_with_xp(&self, xp: u64) -> UserId {
        let user_id = UserId::random();
        let id = *user_id.as_uuid();
        let mut client = self.connect();
        client
            .execute("INSERT INTO user_profiles (id) VALUES ($1)", &[&id])
            .expect("insert profile");
        if xp > 0 {
            let amount = i64::try_from(xp).expect("xp fits BIGINT");
            client
                .execute(
                    "INSERT INTO xp_events (user_id, pillar, amount) VALUES ($1, 'physical', $2)",
                    &[&id, &amount],
                )
                .expect("insert xp event");
        }
        user_id
    }

    /// Redemption rows held by `user_id`, in any status.
    fn redemption_rows(&self, user_id: &UserId) -> i64 {
        self.connect()
            .query_one(
                "SELECT count(*) FROM reward_redemptions WHERE user_id = $1",
                &[user_id.as_uuid()],
            )
            .expect("count redemptions")
            .get(0)
    }

    fn reward(&self, xp_cost: u64, stock_quantity: Option<u64>) -> Reward {
        let reward = Reward {
            id: RewardId::random(),
            title: format!("Reward worth {xp_cost} XP"),
            description: None,
            category: "physical".to_owned(),
            partner_name: Some("Studio Calm".to_owned()),
            image_url: None,
            xp_cost,
            is_active: true,
            stock_quantity,
        };
        self.runtime
            .block_on(self.rewards.upsert(&reward))
            .expect("reward stored");
        reward
    }

    fn xp_available(&self, user_id: &UserId) -> u64 {
        self.runtime
            .block_on(self.ledger.snapshot(user_id))
            .expect("snapshot loads")
            .expect("profile exists")
            .xp_available()
    }

    fn redeem_all(&self, requests: Vec<RedeemRequest>) -> Vec<Result<RedemptionOutcome, Error>> {
        self.runtime.block_on(async {
            let tasks = requests.into_iter().map(|request| {
                let service = Arc::clone(&self.redemptions);
                tokio::spawn(async move { service.redeem(request).await })
            });
            join_all(tasks)
                .await
                .into_iter()
                .map(|joined| joined.expect("redemption task should not panic"))
                .collect()
        })
    }
}

fn setup_ledger() -> Result<PgLedger, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(|err| err.to_string())?;
    let cluster = shared_cluster()?;
    let database = provision_template_database(cluster)?;
    let database_url = database.url().to_string();

    let config = PoolConfig::new(database_url.as_str())
        .with_max_size(6)
        .with_min_idle(Some(1));
    let pool = runtime
        .block_on(DbPool::new(config))
        .map_err(|err| err.to_string())?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let redemptions = RedemptionService::new(
        RedemptionPorts {
            ledger: Arc::new(DieselXpLedgerRepository::new(pool.clone())),
            rewards: Arc::new(DieselRewardRepository::new(pool.clone())),
            store: Arc::new(
                DieselRedemptionStore::new(pool.clone()).with_lock_timeout(Duration::from_secs(1)),
            ),
            idempotency: Arc::new(DieselIdempotencyRepository::new(pool.clone())),
            metrics: Arc::new(NoOpRedemptionMetrics),
        },
        CouponIssuer::random(CouponPolicy::default()),
        IdempotencyConfig::default(),
        RedemptionPolicy::default(),
        clock,
    );

    Ok(PgLedger {
        runtime,
        database_url,
        redemptions: Arc::new(redemptions),
        rewards: DieselRewardRepository::new(pool.clone()),
        ledger: DieselXpLedgerRepository::new(pool.clone()),
        history: DieselRedemptionHistoryRepository::new(pool.clone()),
        pool,
        _database: database,
    })
}

#[fixture]
fn pg_ledger() -> Option<PgLedger> {
    match setup_ledger() {
        Ok(ledger) => Some(ledger),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

fn partition(
    results: Vec<Result<RedemptionOutcome, Error>>,
) -> (Vec<RedemptionOutcome>, Vec<ErrorCode>) {
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(outcome) => successes.push(outcome),
            Err(error) => failures.push(error.code()),
        }
    }
    (successes, failures)
}

#[rstest]
fn last_unit_goes_to_exactly_one_user(pg_ledger: Option<PgLedger>) {
    let Some(ledger) = pg_ledger else {
        eprintln!("SKIP-TEST-CLUSTER: last_unit_goes_to_exactly_one_user skipped");
        return;
    };
    let alice = ledger.user_with_xp(1000);
    let bob = ledger.user_with_xp(1000);
    let reward = ledger.reward(300, Some(1));

    let results = ledger.redeem_all(vec![
        RedeemRequest::new(alice.clone(), reward.id),
        RedeemRequest::new(bob.clone(), reward.id),
    ]);
    let (successes, failures) = partition(results);

    assert_eq!(successes.len(), 1);
    assert_eq!(failures, vec![ErrorCode::OutOfStock]);
    let balances = [ledger.xp_available(&alice), ledger.xp_available(&bob)];
    assert!(balances.contains(&700));
    assert!(balances.contains(&1000));

    let listing = ledger
        .runtime
        .block_on(ledger.rewards.find_listing(&reward.id))
        .expect("listing loads")
        .expect("reward exists");
    assert_eq!(listing.consumed, 1);
    let active = ledger
        .runtime
        .block_on(ledger.rewards.list_active(&RewardFilter::category("physical")))
        .expect("catalog loads");
    assert!(
        active
            .iter()
            .any(|entry| entry.reward.id == reward.id && entry.consumed == 1)
    );
}

#[rstest]
fn parallel_spends_cannot_overdraw_a_balance(pg_ledger: Option<PgLedger>) {
    let Some(ledger) = pg_ledger else {
        eprintln!("SKIP-TEST-CLUSTER: parallel_spends_cannot_overdraw_a_balance skipped");
        return;
    };
    let user = ledger.user_with_xp(500);
    let first = ledger.reward(400, None);
    let second = ledger.reward(400, None);

    let results = ledger.redeem_all(vec![
        RedeemRequest::new(user.clone(), first.id),
        RedeemRequest::new(user.clone(), second.id),
    ]);
    let (successes, failures) = partition(results);

    assert_eq!(successes.len(), 1);
    assert_eq!(failures, vec![ErrorCode::InsufficientXp]);
    assert_eq!(successes[0].receipt.user_xp_after, 100);
    assert_eq!(ledger.xp_available(&user), 100);
    assert_eq!(ledger.redemption_rows(&user), 1);
}

#[rstest]
fn dropped_unit_of_work_leaves_no_redemption(pg_ledger: Option<PgLedger>) {
    let Some(ledger) = pg_ledger else {
        eprintln!("SKIP-TEST-CLUSTER: dropped_unit_of_work_leaves_no_redemption skipped");
        return;
    };
    let user = ledger.user_with_xp(800);
    let reward = ledger.reward(300, Some(3));
    let store = DieselRedemptionStore::new(ledger.pool.clone());

    ledger.runtime.block_on(async {
        let mut uow = store
            .begin(&RedemptionScope {
                user_id: user.clone(),
                reward_id: reward.id,
            })
            .await
            .expect("begin");
        let snapshot = uow.load_snapshot().await.expect("locks taken");
        assert_eq!(snapshot.xp_available, Some(800));
        uow.insert_redemption(&NewRedemption {
            id: RedemptionId::random(),
            user_id: user.clone(),
            reward_id: reward.id,
            xp_spent: reward.xp_cost,
            status: RedemptionStatus::Approved,
            created_at: Utc::now(),
            delivery_info: None,
        })
        .await
        .expect("staged insert");
        drop(uow);
    });

    assert_eq!(ledger.redemption_rows(&user), 0);
    assert_eq!(ledger.xp_available(&user), 800);

    // The abandoned locks are gone, so the same scope can redeem again.
    let outcome = ledger
        .runtime
        .block_on(
            ledger
                .redemptions
                .redeem(RedeemRequest::new(user.clone(), reward.id)),
        )
        .expect("redeemed after the abandoned attempt");
    assert_eq!(outcome.receipt.user_xp_after, 500);
    assert_eq!(ledger.redemption_rows(&user), 1);
}

#[rstest]
fn receipts_replay_then_expire_after_the_ttl(pg_ledger: Option<PgLedger>) {
    let Some(ledger) = pg_ledger else {
        eprintln!("SKIP-TEST-CLUSTER: receipts_replay_then_expire_after_the_ttl skipped");
        return;
    };
    let user = ledger.user_with_xp(600);
    let reward = ledger.reward(200, None);
    let request =
        RedeemRequest::new(user.clone(), reward.id).with_idempotency_key(IdempotencyKey::random());

    let first = ledger
        .runtime
        .block_on(ledger.redemptions.redeem(request.clone()))
        .expect("first call redeems");
    let replay = ledger
        .runtime
        .block_on(ledger.redemptions.redeem(request))
        .expect("second call replays");

    assert!(!first.replayed);
    assert!(replay.replayed);
    assert_eq!(replay.receipt, first.receipt);
    assert_eq!(ledger.redemption_rows(&user), 1);
    assert_eq!(ledger.xp_available(&user), 400);

    let ttl = Duration::from_secs(24 * 3600);
    let within_ttl = DieselIdempotencyRepository::new(ledger.pool.clone())
        .with_clock(Arc::new(ShiftedClock(TimeDelta::hours(23))));
    let past_ttl = DieselIdempotencyRepository::new(ledger.pool.clone())
        .with_clock(Arc::new(ShiftedClock(TimeDelta::hours(25))));
    let kept = ledger
        .runtime
        .block_on(within_ttl.cleanup_expired(ttl))
        .expect("cleanup runs");
    let removed = ledger
        .runtime
        .block_on(past_ttl.cleanup_expired(ttl))
        .expect("cleanup runs");

    assert_eq!(kept, 0);
    assert_eq!(removed, 1);
}

#[rstest]
fn history_pages_newest_first_with_coupons(pg_ledger: Option<PgLedger>) {
    let Some(ledger) = pg_ledger else {
        eprintln!("SKIP-TEST-CLUSTER: history_pages_newest_first_with_coupons skipped");
        return;
    };
    let user = ledger.user_with_xp(1000);
    let mut redeemed = Vec::new();
    for xp_cost in [100, 200, 300] {
        let reward = ledger.reward(xp_cost, None);
        let outcome = ledger
            .runtime
            .block_on(
                ledger
                    .redemptions
                    .redeem(RedeemRequest::new(user.clone(), reward.id)),
            )
            .expect("redeemed");
        redeemed.push(outcome.receipt.redemption.id);
    }

    let first_page = ledger
        .runtime
        .block_on(
            ledger
                .history
                .list_for_user(&user, HistoryPage::new(Some(2), None)),
        )
        .expect("history loads");
    let ids: Vec<_> = first_page
        .iter()
        .map(|record| record.redemption.id)
        .collect();
    assert_eq!(ids, vec![redeemed[2], redeemed[1]]);
    assert!(first_page.iter().all(|record| record.coupon.is_some()));
    assert_eq!(first_page[0].reward_title, "Reward worth 300 XP");

    let cursor = first_page[1].redemption.sequence;
    let second_page = ledger
        .runtime
        .block_on(
            ledger
                .history
                .list_for_user(&user, HistoryPage::new(Some(2), Some(cursor))),
        )
        .expect("history loads");
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].redemption.id, redeemed[0]);
    assert_eq!(ledger.xp_available(&user), 400);
}
