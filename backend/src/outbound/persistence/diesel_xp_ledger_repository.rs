//! PostgreSQL-backed `XpLedgerRepository` implementation.
//!
//! Aggregates `xp_events` and approved `reward_redemptions` on every call;
//! there is no stored balance column to drift.

use async_trait::async_trait;

use crate::domain::ports::{XpLedgerRepository, XpLedgerRepositoryError};
use crate::domain::{LedgerSnapshot, UserId};

use super::diesel_helpers::{map_basic_diesel_error, map_pool_error_message};
use super::ledger_queries::{ledger_snapshot, profile_exists};
use super::pool::{DbPool, PoolError};

/// Diesel-backed implementation of the `XpLedgerRepository` port.
#[derive(Clone)]
pub struct DieselXpLedgerRepository {
    pool: DbPool,
}

impl DieselXpLedgerRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> XpLedgerRepositoryError {
    XpLedgerRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> XpLedgerRepositoryError {
    map_basic_diesel_error(
        error,
        "xp ledger snapshot",
        XpLedgerRepositoryError::query,
        XpLedgerRepositoryError::connection,
    )
}

#[async_trait]
impl XpLedgerRepository for DieselXpLedgerRepository {
    async fn snapshot(
        &self,
        user_id: &UserId,
    ) -> Result<Option<LedgerSnapshot>, XpLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        if !profile_exists(&mut conn, user_id, false)
            .await
            .map_err(map_diesel_error)?
        {
            return Ok(None);
        }
        ledger_snapshot(&mut conn, user_id)
            .await
            .map(Some)
            .map_err(map_diesel_error)
    }
}
