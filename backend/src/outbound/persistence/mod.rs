//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain's driven ports backed by
//! PostgreSQL via `diesel-async` and `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories only translate between Diesel rows and
//!   domain types. Balance and stock arithmetic stays in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Derived state**: balances and remaining stock are aggregated from
//!   `xp_events` and `reward_redemptions` on read; no counters are stored.
//! - **Row locks**: the redemption store serialises on the user profile and
//!   finite-stock reward rows.
//!
//! # Example
//!
//! ```ignore
//! use rewards_ledger::outbound::persistence::{DbPool, DieselRedemptionStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/rewards")).await?;
//! let store = DieselRedemptionStore::new(pool.clone());
//! ```

mod diesel_helpers;
mod diesel_idempotency_repository;
mod diesel_redemption_history_repository;
mod diesel_redemption_store;
mod diesel_reward_repository;
mod diesel_xp_ledger_repository;
mod ledger_queries;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_idempotency_repository::DieselIdempotencyRepository;
pub use diesel_redemption_history_repository::DieselRedemptionHistoryRepository;
pub use diesel_redemption_store::DieselRedemptionStore;
pub use diesel_reward_repository::DieselRewardRepository;
pub use diesel_xp_ledger_repository::DieselXpLedgerRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
