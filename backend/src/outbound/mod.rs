//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repositories and the transactional
//!   redemption store, using Diesel.
//! - **memory**: in-process implementation of every persistence port.
//! - **metrics**: Prometheus exporters (feature-gated).
//!
//! Adapters translate between domain types and storage representations.
//! Balance, stock and eligibility rules live in the domain.

pub mod memory;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod persistence;
