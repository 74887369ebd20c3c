//! Driven port over the activity ledger and approved debits.
//!
//! Adapters aggregate earning events and approved redemptions into a
//! [`LedgerSnapshot`]; the balance arithmetic lives in the domain.

use async_trait::async_trait;

use crate::domain::{LedgerSnapshot, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised while reading the ledger.
    pub enum XpLedgerRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "xp ledger connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "xp ledger query failed: {message}",
    }
}

/// Read access to a user's earning and spending aggregates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait XpLedgerRepository: Send + Sync {
    /// Aggregate the ledger for `user_id`.
    ///
    /// Returns `Ok(None)` when the user has neither a profile nor any ledger
    /// entries.
    async fn snapshot(
        &self,
        user_id: &UserId,
    ) -> Result<Option<LedgerSnapshot>, XpLedgerRepositoryError>;
}
