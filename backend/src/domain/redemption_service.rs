//! Atomic redemption orchestrator implementing [`RedemptionCommand`].
//!
//! A redeem call runs in three layers:
//!
//! 1. A lock-free idempotency lookup that replays a committed receipt or
//!    rejects a reused key.
//! 2. A bounded retry loop around one unit of work, retried only when the
//!    store reports lock contention, all under a single wall-clock timeout.
//! 3. The unit of work itself: re-check the key under lock, load the balance
//!    and reward, apply the eligibility rules, insert the approved redemption,
//!    issue a coupon and store the receipt.
//!
//! The timeout ends where commit begins. A commit that has been issued is
//! awaited to completion, so a durable redemption is never reported as a
//! timeout.
//!
//! Any error inside the unit of work rolls it back, so a debit is never
//! visible without its redemption and coupon. The one exception is coupon
//! code exhaustion, where the redemption is kept as `cancelled` for audit
//! and committed with no debit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::port_error_mapping::{
    map_idempotency_error, map_ledger_error, map_reward_repository_error,
};
use crate::domain::ports::{
    CouponInsert, IdempotencyRepository, RedemptionCommand, RedemptionMetrics,
    RedemptionOutcomeKind, RedemptionScope, RedemptionStore, RedemptionStoreError,
    RedemptionUnitOfWork, RewardRepository, XpLedgerRepository,
};
use crate::domain::{
    Coupon, CouponIssuer, Error, ErrorCode, IdempotencyConfig, IdempotencyKey,
    IdempotencyLookupQuery, IdempotencyLookupResult, IdempotencyRecord, NewRedemption,
    PayloadHash, RedeemRequest, RedeemedReward, Redemption, RedemptionCheck, RedemptionId,
    RedemptionOutcome, RedemptionReceipt, RedemptionStatus, RewardId, UserId,
    canonicalize_and_hash, evaluate,
};

/// Timing bounds for the transactional part of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionPolicy {
    timeout: Duration,
    contention_retries: u32,
    retry_backoff: Duration,
}

impl RedemptionPolicy {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    const DEFAULT_CONTENTION_RETRIES: u32 = 3;
    const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

    /// Build a policy from explicit bounds.
    pub const fn new(timeout: Duration, contention_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            timeout,
            contention_retries,
            retry_backoff,
        }
    }

    /// Wall-clock budget for every attempt of one redeem call combined.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Extra attempts after the first when the store reports contention.
    pub const fn contention_retries(&self) -> u32 {
        self.contention_retries
    }

    /// Base delay between attempts; grows linearly with the attempt number.
    pub const fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }
}

impl Default for RedemptionPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_TIMEOUT,
            Self::DEFAULT_CONTENTION_RETRIES,
            Self::DEFAULT_RETRY_BACKOFF,
        )
    }
}

/// Driven ports the orchestrator depends on.
#[derive(Clone)]
pub struct RedemptionPorts {
    pub ledger: Arc<dyn XpLedgerRepository>,
    pub rewards: Arc<dyn RewardRepository>,
    pub store: Arc<dyn RedemptionStore>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
    pub metrics: Arc<dyn RedemptionMetrics>,
}

/// Why one unit-of-work attempt ended early.
#[derive(Debug)]
enum AttemptError {
    /// Lost a lock race; the whole attempt may be retried.
    Contention(String),
    /// Final for this call.
    Rejected(Error),
}

impl From<Error> for AttemptError {
    fn from(value: Error) -> Self {
        Self::Rejected(value)
    }
}

impl From<RedemptionStoreError> for AttemptError {
    fn from(value: RedemptionStoreError) -> Self {
        match value {
            RedemptionStoreError::Contention { message } => Self::Contention(message),
            other => {
                error!(error = %other, "redemption store failed mid-transaction");
                Self::Rejected(Error::redemption_failed(
                    "redemption could not be completed; please retry",
                ))
            }
        }
    }
}

/// How a unit of work finished staging.
enum Prepared {
    /// A receipt committed by a concurrent call with the same key.
    Replayed(RedemptionOutcome),
    /// Every write is staged; only commit remains.
    Staged {
        redemption: Redemption,
        receipt: RedemptionReceipt,
    },
}

/// A prepared unit of work that still holds its locks.
type OpenAttempt = (Prepared, Box<dyn RedemptionUnitOfWork>);

enum CouponFailure {
    Exhausted { attempts: u8 },
    Store(RedemptionStoreError),
}

/// Orchestrates validation, debit, redemption and coupon issuance.
#[derive(Clone)]
pub struct RedemptionService {
    ports: RedemptionPorts,
    coupons: CouponIssuer,
    idempotency: IdempotencyConfig,
    policy: RedemptionPolicy,
    clock: Arc<dyn Clock>,
}

impl RedemptionService {
    /// Create the orchestrator. Every policy value is passed explicitly.
    pub fn new(
        ports: RedemptionPorts,
        coupons: CouponIssuer,
        idempotency: IdempotencyConfig,
        policy: RedemptionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ports,
            coupons,
            idempotency,
            policy,
            clock,
        }
    }

    fn payload_hash(reward_id: &RewardId) -> Result<PayloadHash, Error> {
        canonicalize_and_hash(&json!({ "rewardId": reward_id.to_string() }))
            .map_err(|err| Error::internal(format!("failed to hash redemption payload: {err}")))
    }

    /// Key for callers that did not supply one: the same user redeeming the
    /// same reward inside one bucket maps onto one key.
    fn derived_key(&self, request: &RedeemRequest, now: DateTime<Utc>) -> IdempotencyKey {
        let bucket_secs = i64::try_from(self.idempotency.derived_key_bucket().as_secs())
            .unwrap_or(i64::MAX)
            .max(1);
        let bucket = now.timestamp().div_euclid(bucket_secs).to_string();
        IdempotencyKey::derive(&[
            request.user_id.as_ref(),
            &request.reward_id.to_string(),
            &bucket,
        ])
    }

    fn replay(record: IdempotencyRecord) -> Result<RedemptionOutcome, Error> {
        let receipt: RedemptionReceipt = serde_json::from_value(record.response_snapshot)
            .map_err(|err| Error::internal(format!("failed to decode stored receipt: {err}")))?;
        Ok(RedemptionOutcome {
            receipt,
            replayed: true,
        })
    }

    fn key_conflict() -> Error {
        Error::idempotency_conflict("idempotency key already used for a different reward")
    }

    async fn redeem_inner(&self, request: &RedeemRequest) -> Result<RedemptionOutcome, Error> {
        let key = match &request.idempotency_key {
            Some(key) => key.clone(),
            None => self.derived_key(request, self.clock.utc()),
        };
        let query = IdempotencyLookupQuery::new(
            key,
            request.user_id.clone(),
            Self::payload_hash(&request.reward_id)?,
        );

        match self
            .ports
            .idempotency
            .lookup(&query)
            .await
            .map_err(map_idempotency_error)?
        {
            IdempotencyLookupResult::MatchingPayload(record) => return Self::replay(record),
            IdempotencyLookupResult::ConflictingPayload(_) => return Err(Self::key_conflict()),
            IdempotencyLookupResult::NotFound => {}
        }

        let (prepared, uow) = match tokio::time::timeout(
            self.policy.timeout,
            self.run_with_retries(request, &query),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    user_id = %request.user_id,
                    reward_id = %request.reward_id,
                    timeout_ms = u64::try_from(self.policy.timeout.as_millis()).unwrap_or(u64::MAX),
                    "redemption timed out; transaction abandoned"
                );
                return Err(Error::redemption_timeout(
                    "redemption did not complete in time; please retry",
                ));
            }
        };

        match prepared {
            Prepared::Replayed(outcome) => Ok(outcome),
            Prepared::Staged {
                redemption,
                receipt,
            } => self.commit(request, uow, redemption, receipt).await,
        }
    }

    /// Commit a staged redemption without a deadline.
    async fn commit(
        &self,
        request: &RedeemRequest,
        mut uow: Box<dyn RedemptionUnitOfWork>,
        redemption: Redemption,
        receipt: RedemptionReceipt,
    ) -> Result<RedemptionOutcome, Error> {
        if let Err(err) = uow.commit().await {
            if let Err(rollback) = uow.rollback().await {
                warn!(error = %rollback, "redemption rollback failed");
            }
            return Err(match AttemptError::from(err) {
                AttemptError::Contention(message) => {
                    warn!(
                        user_id = %request.user_id,
                        reward_id = %request.reward_id,
                        %message,
                        "redemption lost a serialisation race at commit"
                    );
                    Error::redemption_timeout("redemption is busy; please retry shortly")
                }
                AttemptError::Rejected(err) => err,
            });
        }

        info!(
            user_id = %request.user_id,
            reward_id = %request.reward_id,
            redemption_id = %redemption.id,
            sequence = redemption.sequence,
            xp_spent = redemption.xp_spent,
            "reward redeemed"
        );
        Ok(RedemptionOutcome {
            receipt,
            replayed: false,
        })
    }

    async fn run_with_retries(
        &self,
        request: &RedeemRequest,
        query: &IdempotencyLookupQuery,
    ) -> Result<OpenAttempt, Error> {
        let mut retries = 0_u32;
        loop {
            match self.attempt(request, query).await {
                Ok(open) => return Ok(open),
                Err(AttemptError::Rejected(err)) => return Err(err),
                Err(AttemptError::Contention(message))
                    if retries < self.policy.contention_retries =>
                {
                    retries += 1;
                    debug!(
                        user_id = %request.user_id,
                        reward_id = %request.reward_id,
                        retries,
                        %message,
                        "redemption contention; retrying"
                    );
                    tokio::time::sleep(self.policy.retry_backoff.saturating_mul(retries)).await;
                }
                Err(AttemptError::Contention(message)) => {
                    warn!(
                        user_id = %request.user_id,
                        reward_id = %request.reward_id,
                        retries,
                        %message,
                        "redemption contention persisted; giving up"
                    );
                    return Err(Error::redemption_timeout(
                        "redemption is busy; please retry shortly",
                    ));
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &RedeemRequest,
        query: &IdempotencyLookupQuery,
    ) -> Result<OpenAttempt, AttemptError> {
        let scope = RedemptionScope {
            user_id: request.user_id.clone(),
            reward_id: request.reward_id,
        };
        let mut uow = self.ports.store.begin(&scope).await.map_err(|err| match err {
            RedemptionStoreError::Connection { message } => AttemptError::Rejected(
                Error::service_unavailable(format!("redemption store unavailable: {message}")),
            ),
            other => AttemptError::from(other),
        })?;

        match self.execute(uow.as_mut(), request, query).await {
            Ok(prepared) => Ok((prepared, uow)),
            Err(err) => {
                if let Err(rollback) = uow.rollback().await {
                    warn!(error = %rollback, "redemption rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        uow: &mut dyn RedemptionUnitOfWork,
        request: &RedeemRequest,
        query: &IdempotencyLookupQuery,
    ) -> Result<Prepared, AttemptError> {
        // A concurrent call with the same key may have committed while this
        // one waited for the lock.
        match uow.lookup_receipt(query).await? {
            IdempotencyLookupResult::MatchingPayload(record) => {
                uow.rollback().await?;
                return Ok(Prepared::Replayed(Self::replay(record)?));
            }
            IdempotencyLookupResult::ConflictingPayload(_) => {
                return Err(Self::key_conflict().into());
            }
            IdempotencyLookupResult::NotFound => {}
        }

        let snapshot = uow.load_snapshot().await?;
        let xp_available = snapshot.xp_available.ok_or_else(|| {
            Error::invalid_user(format!("user {} not found", request.user_id))
        })?;
        let listing = snapshot.reward.ok_or_else(|| {
            Error::invalid_reward(format!("reward {} not found", request.reward_id))
        })?;

        let check = evaluate(xp_available, Some(&listing));
        if let Some(rejection) = check.to_error() {
            debug!(
                user_id = %request.user_id,
                reward_id = %request.reward_id,
                code = %rejection.code(),
                "redemption rejected by business rules"
            );
            return Err(rejection.into());
        }

        let now = self.clock.utc();
        let redemption = uow
            .insert_redemption(&NewRedemption {
                id: RedemptionId::random(),
                user_id: request.user_id.clone(),
                reward_id: request.reward_id,
                xp_spent: listing.reward.xp_cost,
                status: RedemptionStatus::Approved,
                created_at: now,
                delivery_info: request.delivery_info.clone(),
            })
            .await?;

        let coupon = match self.issue_coupon(uow, redemption.id, now).await {
            Ok(coupon) => coupon,
            Err(failure) => return Err(Self::compensate(uow, &redemption, failure).await),
        };

        let receipt = RedemptionReceipt {
            redemption: RedeemedReward {
                id: redemption.id,
                status: redemption.status,
                coupon_code: coupon.code,
                expires_at: coupon.expires_at,
                reward_title: listing.reward.title,
            },
            user_xp_after: xp_available.saturating_sub(redemption.xp_spent),
        };
        let response_snapshot = serde_json::to_value(&receipt)
            .map_err(|err| Error::internal(format!("failed to encode receipt: {err}")))?;
        uow.store_receipt(&IdempotencyRecord {
            key: query.key.clone(),
            user_id: request.user_id.clone(),
            payload_hash: query.payload_hash.clone(),
            response_snapshot,
            created_at: now,
        })
        .await?;

        Ok(Prepared::Staged {
            redemption,
            receipt,
        })
    }

    async fn issue_coupon(
        &self,
        uow: &mut dyn RedemptionUnitOfWork,
        redemption_id: RedemptionId,
        issued_at: DateTime<Utc>,
    ) -> Result<Coupon, CouponFailure> {
        let attempts = self.coupons.policy().max_attempts();
        for attempt in 1..=attempts {
            let coupon = self.coupons.issue(redemption_id, issued_at);
            match uow.insert_coupon(&coupon).await {
                Ok(CouponInsert::Inserted) => return Ok(coupon),
                Ok(CouponInsert::CodeTaken) => {
                    debug!(%redemption_id, attempt, "coupon code collision; regenerating");
                }
                Err(err) => return Err(CouponFailure::Store(err)),
            }
        }
        Err(CouponFailure::Exhausted { attempts })
    }

    /// Undo the debit after coupon issuance failed.
    ///
    /// On exhaustion the redemption is cancelled and committed, which leaves
    /// an audit row that neither debits XP nor consumes stock. Store failures
    /// propagate so the caller rolls the whole unit of work back.
    async fn compensate(
        uow: &mut dyn RedemptionUnitOfWork,
        redemption: &Redemption,
        failure: CouponFailure,
    ) -> AttemptError {
        match failure {
            CouponFailure::Exhausted { attempts } => {
                error!(
                    user_id = %redemption.user_id,
                    reward_id = %redemption.reward_id,
                    redemption_id = %redemption.id,
                    attempts,
                    "coupon codes exhausted; cancelling redemption"
                );
                let cancelled = async {
                    uow.cancel_redemption(&redemption.id).await?;
                    uow.commit().await
                }
                .await;
                match cancelled {
                    Ok(()) => AttemptError::Rejected(Error::coupon_generation_failed(
                        "could not issue a unique coupon; no XP was spent",
                    )),
                    Err(err) => AttemptError::from(err),
                }
            }
            CouponFailure::Store(err) => {
                error!(
                    user_id = %redemption.user_id,
                    reward_id = %redemption.reward_id,
                    redemption_id = %redemption.id,
                    error = %err,
                    "coupon insert failed; rolling back redemption"
                );
                AttemptError::from(err)
            }
        }
    }

    async fn record_outcome(&self, result: &Result<RedemptionOutcome, Error>) {
        let outcome = match result {
            Ok(outcome) if outcome.replayed => RedemptionOutcomeKind::Replayed,
            Ok(_) => RedemptionOutcomeKind::Redeemed,
            Err(err) => match err.code() {
                ErrorCode::InsufficientXp => RedemptionOutcomeKind::InsufficientXp,
                ErrorCode::OutOfStock => RedemptionOutcomeKind::OutOfStock,
                ErrorCode::RewardUnavailable => RedemptionOutcomeKind::RewardUnavailable,
                ErrorCode::IdempotencyConflict => RedemptionOutcomeKind::IdempotencyConflict,
                ErrorCode::CouponGenerationFailed => RedemptionOutcomeKind::CouponGenerationFailed,
                ErrorCode::RedemptionTimeout => RedemptionOutcomeKind::Timeout,
                _ => RedemptionOutcomeKind::Failed,
            },
        };
        if let Err(err) = self.ports.metrics.record_outcome(outcome).await {
            warn!(error = %err, outcome = outcome.as_label(), "failed to record redemption metric");
        }
    }
}

#[async_trait]
impl RedemptionCommand for RedemptionService {
    async fn validate(
        &self,
        user_id: &UserId,
        reward_id: &RewardId,
    ) -> Result<RedemptionCheck, Error> {
        let snapshot = self
            .ports
            .ledger
            .snapshot(user_id)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::invalid_user(format!("user {user_id} not found")))?;
        let listing = self
            .ports
            .rewards
            .find_listing(reward_id)
            .await
            .map_err(map_reward_repository_error)?;
        Ok(evaluate(snapshot.xp_available(), listing.as_ref()))
    }

    async fn redeem(&self, request: RedeemRequest) -> Result<RedemptionOutcome, Error> {
        let result = self.redeem_inner(&request).await;
        self.record_outcome(&result).await;
        result
    }
}

#[cfg(test)]
#[path = "redemption_service_tests.rs"]
mod tests;
