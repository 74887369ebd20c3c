//! PostgreSQL-backed `RedemptionStore`.
//!
//! Each unit of work owns one pooled connection with an open transaction:
//!
//! 1. `SET LOCAL lock_timeout` bounds every lock wait.
//! 2. `load_snapshot` takes `FOR UPDATE` on the user profile, then on the
//!    reward row when its stock is finite. The fixed order avoids lock cycles
//!    between redemptions.
//! 3. Aggregates are read after the locks are held, so they include every
//!    redemption committed by the previous lock holder.
//! 4. Coupons are inserted with `ON CONFLICT (code) DO NOTHING`.
//!
//! Dropping an unfinished unit of work returns a connection that is still
//! inside a transaction; the pool treats it as broken and discards it, which
//! rolls the transaction back server-side.

use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_query;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use tracing::debug;

use crate::domain::ports::{
    CouponInsert, RedemptionScope, RedemptionSnapshot, RedemptionStore, RedemptionStoreError,
    RedemptionUnitOfWork,
};
use crate::domain::{
    Coupon, IdempotencyLookupQuery, IdempotencyLookupResult, IdempotencyRecord, NewRedemption,
    Redemption, RedemptionId, RedemptionStatus,
};

use super::diesel_helpers::{
    DieselFailure, amount_to_db, classify_diesel_error, map_diesel_error_message,
    map_pool_error_message,
};
use super::diesel_idempotency_repository::row_to_record;
use super::ledger_queries::{find_reward, ledger_snapshot, listings, profile_exists};
use super::models::{IdempotencyKeyRow, NewCouponRow, NewIdempotencyKeyRow, NewRedemptionRow};
use super::pool::{DbPool, PoolError};
use super::schema::{idempotency_keys, reward_coupons, reward_redemptions};

/// Diesel-backed implementation of the `RedemptionStore` port.
#[derive(Clone)]
pub struct DieselRedemptionStore {
    pool: DbPool,
    lock_timeout: Duration,
}

impl DieselRedemptionStore {
    /// Default bound on a single lock wait.
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

    /// Create a store with the default lock timeout.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override how long a statement may wait for a row lock.
    ///
    /// A zero duration would disable the timeout in PostgreSQL, so it is
    /// raised to one millisecond.
    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout.max(Duration::from_millis(1));
        self
    }
}

fn map_pool_error(error: PoolError) -> RedemptionStoreError {
    RedemptionStoreError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: DieselError, operation: &str) -> RedemptionStoreError {
    let message = map_diesel_error_message(&error, operation);
    match classify_diesel_error(&error) {
        DieselFailure::Contention => RedemptionStoreError::contention(message),
        DieselFailure::Connection => RedemptionStoreError::connection(message),
        DieselFailure::Query => RedemptionStoreError::query(message),
    }
}

fn lock_timeout_sql(lock_timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = '{}ms'", lock_timeout.as_millis())
}

#[async_trait]
impl RedemptionStore for DieselRedemptionStore {
    async fn begin(
        &self,
        scope: &RedemptionScope,
    ) -> Result<Box<dyn RedemptionUnitOfWork>, RedemptionStoreError> {
        let mut conn = self.pool.get_owned().await.map_err(map_pool_error)?;
        AnsiTransactionManager::begin_transaction(&mut *conn)
            .await
            .map_err(|err| map_diesel_error(err, "begin redemption transaction"))?;
        let mut uow = DieselUnitOfWork {
            conn: Some(conn),
            scope: scope.clone(),
        };
        let set_timeout = lock_timeout_sql(self.lock_timeout);
        let conn = uow.conn()?;
        if let Err(err) = sql_query(set_timeout).execute(conn).await {
            uow.rollback().await?;
            return Err(map_diesel_error(err, "set lock timeout"));
        }
        debug!(user_id = %scope.user_id, reward_id = %scope.reward_id, "redemption transaction opened");
        Ok(Box::new(uow))
    }
}

struct DieselUnitOfWork {
    conn: Option<PooledConnection<'static, AsyncPgConnection>>,
    scope: RedemptionScope,
}

impl DieselUnitOfWork {
    fn conn(&mut self) -> Result<&mut AsyncPgConnection, RedemptionStoreError> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| RedemptionStoreError::query("unit of work already finished"))
    }
}

#[async_trait]
impl RedemptionUnitOfWork for DieselUnitOfWork {
    async fn lookup_receipt(
        &mut self,
        query: &IdempotencyLookupQuery,
    ) -> Result<IdempotencyLookupResult, RedemptionStoreError> {
        let conn = self.conn()?;
        let row: Option<IdempotencyKeyRow> = idempotency_keys::table
            .find((*query.user_id.as_uuid(), *query.key.as_uuid()))
            .select(IdempotencyKeyRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "lookup receipt"))?;
        let record = row
            .map(row_to_record)
            .transpose()
            .map_err(RedemptionStoreError::serialization)?;
        Ok(IdempotencyLookupResult::classify(record, &query.payload_hash))
    }

    async fn load_snapshot(&mut self) -> Result<RedemptionSnapshot, RedemptionStoreError> {
        let user_id = self.scope.user_id.clone();
        let reward_id = self.scope.reward_id;
        let conn = self.conn()?;

        let xp_available = if profile_exists(conn, &user_id, true)
            .await
            .map_err(|err| map_diesel_error(err, "lock user profile"))?
        {
            let snapshot = ledger_snapshot(conn, &user_id)
                .await
                .map_err(|err| map_diesel_error(err, "load ledger snapshot"))?;
            Some(snapshot.xp_available())
        } else {
            None
        };

        let mut row = find_reward(conn, &reward_id, false)
            .await
            .map_err(|err| map_diesel_error(err, "load reward"))?;
        if row.as_ref().is_some_and(|found| found.stock_quantity.is_some()) {
            row = find_reward(conn, &reward_id, true)
                .await
                .map_err(|err| map_diesel_error(err, "lock reward"))?;
        }
        let reward = match row {
            Some(row) => listings(conn, vec![row])
                .await
                .map_err(|err| map_diesel_error(err, "count reward stock"))?
                .pop(),
            None => None,
        };

        Ok(RedemptionSnapshot {
            xp_available,
            reward,
        })
    }

    async fn insert_redemption(
        &mut self,
        redemption: &NewRedemption,
    ) -> Result<Redemption, RedemptionStoreError> {
        let delivery_info = redemption
            .delivery_info
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| RedemptionStoreError::serialization(err.to_string()))?;
        let row = NewRedemptionRow {
            id: *redemption.id.as_uuid(),
            user_id: *redemption.user_id.as_uuid(),
            reward_id: *redemption.reward_id.as_uuid(),
            xp_spent: amount_to_db(redemption.xp_spent, "xp_spent")
                .map_err(RedemptionStoreError::query)?,
            status: redemption.status.as_str(),
            delivery_info,
            created_at: redemption.created_at,
        };
        let conn = self.conn()?;
        let sequence: i64 = diesel::insert_into(reward_redemptions::table)
            .values(&row)
            .returning(reward_redemptions::sequence)
            .get_result(conn)
            .await
            .map_err(|err| map_diesel_error(err, "insert redemption"))?;

        Ok(Redemption {
            id: redemption.id,
            user_id: redemption.user_id.clone(),
            reward_id: redemption.reward_id,
            xp_spent: redemption.xp_spent,
            status: redemption.status,
            sequence,
            created_at: redemption.created_at,
            delivery_info: redemption.delivery_info.clone(),
        })
    }

    async fn insert_coupon(
        &mut self,
        coupon: &Coupon,
    ) -> Result<CouponInsert, RedemptionStoreError> {
        let row = NewCouponRow {
            id: coupon.id,
            redemption_id: *coupon.redemption_id.as_uuid(),
            code: coupon.code.as_str(),
            is_used: coupon.is_used(),
            used_at: coupon.used_at,
            issued_at: coupon.issued_at,
            expires_at: coupon.expires_at,
        };
        let conn = self.conn()?;
        let inserted = diesel::insert_into(reward_coupons::table)
            .values(&row)
            .on_conflict(reward_coupons::code)
            .do_nothing()
            .execute(conn)
            .await
            .map_err(|err| map_diesel_error(err, "insert coupon"))?;

        Ok(if inserted == 0 {
            CouponInsert::CodeTaken
        } else {
            CouponInsert::Inserted
        })
    }

    async fn cancel_redemption(&mut self, id: &RedemptionId) -> Result<(), RedemptionStoreError> {
        let conn = self.conn()?;
        let updated = diesel::update(reward_redemptions::table.find(*id.as_uuid()))
            .set(reward_redemptions::status.eq(RedemptionStatus::Cancelled.as_str()))
            .execute(conn)
            .await
            .map_err(|err| map_diesel_error(err, "cancel redemption"))?;
        if updated == 0 {
            return Err(RedemptionStoreError::query(format!(
                "redemption {id} does not exist"
            )));
        }
        Ok(())
    }

    async fn store_receipt(
        &mut self,
        record: &IdempotencyRecord,
    ) -> Result<(), RedemptionStoreError> {
        let row = NewIdempotencyKeyRow {
            user_id: *record.user_id.as_uuid(),
            key: *record.key.as_uuid(),
            payload_hash: record.payload_hash.as_bytes(),
            response_snapshot: &record.response_snapshot,
            created_at: record.created_at,
        };
        let conn = self.conn()?;
        diesel::insert_into(idempotency_keys::table)
            .values(&row)
            .execute(conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "store receipt"))
    }

    async fn commit(&mut self) -> Result<(), RedemptionStoreError> {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| RedemptionStoreError::query("unit of work already finished"))?;
        AnsiTransactionManager::commit_transaction(&mut *conn)
            .await
            .map_err(|err| map_diesel_error(err, "commit redemption"))
    }

    async fn rollback(&mut self) -> Result<(), RedemptionStoreError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        AnsiTransactionManager::rollback_transaction(&mut *conn)
            .await
            .map_err(|err| map_diesel_error(err, "rollback redemption"))
    }
}
