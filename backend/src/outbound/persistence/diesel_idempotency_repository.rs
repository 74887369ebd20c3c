//! PostgreSQL-backed `IdempotencyRepository` implementation using Diesel ORM.
//!
//! Lookups here serve the lock-free fast path taken before a redemption
//! transaction opens. Records are written only by the redemption unit of
//! work.
//!
//! # TTL Enforcement
//!
//! Records are not filtered by TTL during lookups. `cleanup_expired` runs at
//! startup and then periodically to remove stale records.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use mockable::{Clock, DefaultClock};
use tracing::debug;

use crate::domain::ports::{IdempotencyRepository, IdempotencyRepositoryError};
use crate::domain::{
    IdempotencyKey, IdempotencyLookupQuery, IdempotencyLookupResult, IdempotencyRecord,
    PayloadHash, UserId,
};

use super::diesel_helpers::{map_basic_diesel_error, map_pool_error_message};
use super::models::IdempotencyKeyRow;
use super::pool::{DbPool, PoolError};
use super::schema::idempotency_keys;

/// Diesel-backed implementation of the `IdempotencyRepository` port.
#[derive(Clone)]
pub struct DieselIdempotencyRepository {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl DieselIdempotencyRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            clock: Arc::new(DefaultClock),
        }
    }

    /// Compute the cleanup cutoff from `clock` instead of the system time.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

fn map_pool_error(error: PoolError) -> IdempotencyRepositoryError {
    IdempotencyRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> IdempotencyRepositoryError {
    map_basic_diesel_error(
        error,
        "idempotency keys",
        IdempotencyRepositoryError::query,
        IdempotencyRepositoryError::connection,
    )
}

/// Convert a database row to a domain record.
///
/// Shared with the redemption unit of work, which reads the same table under
/// lock.
pub(crate) fn row_to_record(row: IdempotencyKeyRow) -> Result<IdempotencyRecord, String> {
    let payload_hash = PayloadHash::try_from_bytes(&row.payload_hash)
        .map_err(|err| format!("corrupted payload hash in database: {err}"))?;

    Ok(IdempotencyRecord {
        key: IdempotencyKey::from_uuid(row.key),
        user_id: UserId::from_uuid(row.user_id),
        payload_hash,
        response_snapshot: row.response_snapshot,
        created_at: row.created_at,
    })
}

#[async_trait]
impl IdempotencyRepository for DieselIdempotencyRepository {
    async fn lookup(
        &self,
        query: &IdempotencyLookupQuery,
    ) -> Result<IdempotencyLookupResult, IdempotencyRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let result: Option<IdempotencyKeyRow> = idempotency_keys::table
            .find((*query.user_id.as_uuid(), *query.key.as_uuid()))
            .select(IdempotencyKeyRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        let record = result
            .map(row_to_record)
            .transpose()
            .map_err(IdempotencyRepositoryError::serialization)?;
        Ok(IdempotencyLookupResult::classify(record, &query.payload_hash))
    }

    async fn cleanup_expired(&self, ttl: Duration) -> Result<u64, IdempotencyRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let cutoff = self.clock.utc()
            - chrono::Duration::from_std(ttl).map_err(|err| {
                IdempotencyRepositoryError::query(format!("invalid TTL duration: {err}"))
            })?;

        let deleted = diesel::delete(idempotency_keys::table)
            .filter(idempotency_keys::created_at.lt(cutoff))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        debug!(deleted, cutoff = %cutoff, "cleaned up expired idempotency records");
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;
    use uuid::Uuid;

    fn row(payload_hash: Vec<u8>) -> IdempotencyKeyRow {
        IdempotencyKeyRow {
            user_id: Uuid::new_v4(),
            key: Uuid::new_v4(),
            payload_hash,
            response_snapshot: json!({"userXpAfter": 200}),
            created_at: Utc::now(),
        }
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let repo_err = map_pool_error(PoolError::checkout("connection refused"));

        assert!(matches!(
            repo_err,
            IdempotencyRepositoryError::Connection { .. }
        ));
        assert!(repo_err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn diesel_error_maps_to_query_error() {
        let repo_err = map_diesel_error(diesel::result::Error::NotFound);

        assert!(matches!(repo_err, IdempotencyRepositoryError::Query { .. }));
    }

    #[rstest]
    fn row_with_valid_hash_converts() {
        let record = row_to_record(row(vec![7; 32])).expect("valid row");
        assert_eq!(record.payload_hash.as_bytes(), &[7; 32]);
    }

    #[rstest]
    fn truncated_hash_is_rejected() {
        let err = row_to_record(row(vec![7; 4])).expect_err("short hash");
        assert!(err.contains("corrupted payload hash"));
    }
}
