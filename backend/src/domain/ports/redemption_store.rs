//! Driven port for the atomic redemption unit of work.
//!
//! [`RedemptionStore::begin`] opens a transaction scoped to one user and one
//! reward. The returned [`RedemptionUnitOfWork`] serialises against every
//! other unit of work touching the same user, or the same finite-stock
//! reward, until it is committed or rolled back. Nothing it writes is visible
//! to other readers before [`RedemptionUnitOfWork::commit`], and dropping an
//! unfinished unit of work discards its changes.

use async_trait::async_trait;

use crate::domain::{
    Coupon, IdempotencyLookupQuery, IdempotencyLookupResult, IdempotencyRecord, NewRedemption,
    Redemption, RedemptionId, RewardId, RewardListing, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by redemption store adapters.
    pub enum RedemptionStoreError {
        /// A lock could not be acquired in time, or the transaction lost a
        /// serialisation race. Safe to retry from the start.
        Contention { message: String } => "redemption store contention: {message}",
        /// Repository connection could not be established.
        Connection { message: String } => "redemption store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "redemption store query failed: {message}",
        /// A stored snapshot could not be encoded or decoded.
        Serialization { message: String } => "redemption store serialization failed: {message}",
    }
}

/// Entities a unit of work locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionScope {
    pub user_id: UserId,
    pub reward_id: RewardId,
}

/// Values read under lock at the start of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionSnapshot {
    /// `None` when the user has no profile.
    pub xp_available: Option<u64>,
    /// `None` when the reward does not exist.
    pub reward: Option<RewardListing>,
}

/// Outcome of a coupon insert under the code uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponInsert {
    Inserted,
    CodeTaken,
}

/// Factory for redemption units of work.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionStore: Send + Sync {
    /// Open a unit of work for `scope`.
    async fn begin(
        &self,
        scope: &RedemptionScope,
    ) -> Result<Box<dyn RedemptionUnitOfWork>, RedemptionStoreError>;
}

/// One in-flight redemption transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionUnitOfWork: Send {
    /// Re-check the idempotency store while holding the user's lock.
    async fn lookup_receipt(
        &mut self,
        query: &IdempotencyLookupQuery,
    ) -> Result<IdempotencyLookupResult, RedemptionStoreError>;

    /// Lock the scoped rows and read the balance and reward listing.
    async fn load_snapshot(&mut self) -> Result<RedemptionSnapshot, RedemptionStoreError>;

    /// Insert the redemption row; the store assigns `sequence`.
    async fn insert_redemption(
        &mut self,
        redemption: &NewRedemption,
    ) -> Result<Redemption, RedemptionStoreError>;

    /// Insert a coupon, reporting a code collision instead of failing.
    async fn insert_coupon(&mut self, coupon: &Coupon)
    -> Result<CouponInsert, RedemptionStoreError>;

    /// Mark a redemption cancelled, releasing its debit and stock unit.
    async fn cancel_redemption(&mut self, id: &RedemptionId) -> Result<(), RedemptionStoreError>;

    /// Persist the receipt for replay under its idempotency key.
    async fn store_receipt(&mut self, record: &IdempotencyRecord)
    -> Result<(), RedemptionStoreError>;

    /// Make every staged change durable and release the locks.
    async fn commit(&mut self) -> Result<(), RedemptionStoreError>;

    /// Discard staged changes. A no-op once the unit of work has finished.
    async fn rollback(&mut self) -> Result<(), RedemptionStoreError>;
}
