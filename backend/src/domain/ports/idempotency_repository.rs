//! Port abstraction for idempotency record lookup and retention.
//!
//! Records are written only inside the redemption unit of work (see
//! [`super::RedemptionUnitOfWork::store_receipt`]) so a receipt can never
//! exist without its committed redemption. This port covers the lock-free
//! fast path used before a transaction opens, and TTL cleanup.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{IdempotencyLookupQuery, IdempotencyLookupResult};

use super::define_port_error;

define_port_error! {
    /// Errors raised by idempotency repository adapters.
    pub enum IdempotencyRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "idempotency repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "idempotency repository query failed: {message}",
        /// Stored payload hash or snapshot could not be decoded.
        Serialization { message: String } => "idempotency repository serialization failed: {message}",
    }
}

/// Port for idempotency record retrieval and expiry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Look up a key scoped to the query's user.
    ///
    /// Returns:
    /// - [`IdempotencyLookupResult::NotFound`] if no record exists for the key.
    /// - [`IdempotencyLookupResult::MatchingPayload`] if a record exists and the
    ///   payload hash matches.
    /// - [`IdempotencyLookupResult::ConflictingPayload`] if a record exists but
    ///   the payload hash differs.
    async fn lookup(
        &self,
        query: &IdempotencyLookupQuery,
    ) -> Result<IdempotencyLookupResult, IdempotencyRepositoryError>;

    /// Remove records older than `ttl`, returning how many were deleted.
    async fn cleanup_expired(&self, ttl: Duration) -> Result<u64, IdempotencyRepositoryError>;
}
