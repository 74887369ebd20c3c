//! Shared helpers for Diesel repository implementations.
//!
//! - Error classification from Diesel errors into connection, contention and
//!   query failures.
//! - Lossless casts between database `BIGINT` columns and domain `u64`
//!   amounts.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Extract a readable message from a pool error.
pub fn map_pool_error_message(error: PoolError) -> String {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    }
}

/// Extract a readable message from a Diesel error and emit debug context.
pub fn map_diesel_error_message(error: &DieselError, operation: &str) -> String {
    let error_message = error.to_string();
    debug!(%error_message, %operation, "diesel operation failed");
    error_message
}

/// Coarse category of a Diesel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieselFailure {
    /// The connection was lost.
    Connection,
    /// Lock timeout, deadlock or serialisation failure; safe to retry.
    Contention,
    /// Anything else.
    Query,
}

/// Classify a Diesel error.
///
/// PostgreSQL lock timeouts (`55P03`) and deadlocks (`40P01`) are reported by
/// Diesel as unknown database errors, so they are recognised by message.
pub fn classify_diesel_error(error: &DieselError) -> DieselFailure {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            DieselFailure::Connection
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            DieselFailure::Contention
        }
        DieselError::DatabaseError(_, info) => {
            let message = info.message().to_lowercase();
            if message.contains("lock timeout")
                || message.contains("deadlock detected")
                || message.contains("could not obtain lock")
            {
                DieselFailure::Contention
            } else {
                DieselFailure::Query
            }
        }
        _ => DieselFailure::Query,
    }
}

/// Map a Diesel error into a repository error without a contention variant.
///
/// Contention is reported as a query failure since plain reads never take
/// locks.
pub fn map_basic_diesel_error<E>(
    error: DieselError,
    operation: &str,
    query: impl FnOnce(String) -> E,
    connection: impl FnOnce(String) -> E,
) -> E {
    let message = map_diesel_error_message(&error, operation);
    match classify_diesel_error(&error) {
        DieselFailure::Connection => connection(message),
        DieselFailure::Contention | DieselFailure::Query => query(message),
    }
}

/// Build a deserialisation error for a row that violates a domain rule.
pub fn corrupt_row(message: impl Into<String>) -> DieselError {
    DieselError::DeserializationError(message.into().into())
}

/// Convert a stored `BIGINT` amount into a domain amount.
///
/// # Errors
///
/// Negative values are reported as corrupt rows; the schema forbids them.
pub fn amount_from_db(value: i64, column: &str) -> Result<u64, DieselError> {
    u64::try_from(value).map_err(|_| corrupt_row(format!("{column} is negative: {value}")))
}

/// Convert a domain amount into a `BIGINT`.
///
/// # Errors
///
/// Returns a message naming `column` when the value exceeds `i64::MAX`.
pub fn amount_to_db(value: u64, column: &str) -> Result<i64, String> {
    i64::try_from(value).map_err(|_| format!("{column} exceeds BIGINT range: {value}"))
}
