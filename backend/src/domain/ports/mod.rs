//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (`*Repository`, [`RedemptionStore`], [`RedemptionMetrics`])
//! are implemented by outbound adapters. Driving ports (`*Query`,
//! [`RedemptionCommand`]) are implemented by domain services and consumed by
//! inbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod balance_query;
mod idempotency_repository;
mod redemption_command;
mod redemption_history_query;
mod redemption_history_repository;
mod redemption_metrics;
mod redemption_store;
mod reward_catalog_query;
mod reward_repository;
mod xp_ledger_repository;

#[cfg(test)]
pub use balance_query::MockBalanceQuery;
pub use balance_query::BalanceQuery;
#[cfg(test)]
pub use idempotency_repository::MockIdempotencyRepository;
pub use idempotency_repository::{IdempotencyRepository, IdempotencyRepositoryError};
#[cfg(test)]
pub use redemption_command::MockRedemptionCommand;
pub use redemption_command::RedemptionCommand;
#[cfg(test)]
pub use redemption_history_query::MockRedemptionHistoryQuery;
pub use redemption_history_query::RedemptionHistoryQuery;
#[cfg(test)]
pub use redemption_history_repository::MockRedemptionHistoryRepository;
pub use redemption_history_repository::{
    RedemptionHistoryRecord, RedemptionHistoryRepository, RedemptionHistoryRepositoryError,
};
#[cfg(test)]
pub use redemption_metrics::MockRedemptionMetrics;
pub use redemption_metrics::{
    NoOpRedemptionMetrics, RedemptionMetrics, RedemptionMetricsError, RedemptionOutcomeKind,
};
#[cfg(test)]
pub use redemption_store::{MockRedemptionStore, MockRedemptionUnitOfWork};
pub use redemption_store::{
    CouponInsert, RedemptionScope, RedemptionSnapshot, RedemptionStore, RedemptionStoreError,
    RedemptionUnitOfWork,
};
#[cfg(test)]
pub use reward_catalog_query::MockRewardCatalogQuery;
pub use reward_catalog_query::RewardCatalogQuery;
#[cfg(test)]
pub use reward_repository::MockRewardRepository;
pub use reward_repository::{RewardFilter, RewardRepository, RewardRepositoryError};
#[cfg(test)]
pub use xp_ledger_repository::MockXpLedgerRepository;
pub use xp_ledger_repository::{XpLedgerRepository, XpLedgerRepositoryError};
