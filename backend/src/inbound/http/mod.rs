//! HTTP inbound adapter exposing the ledger's REST endpoints.
//!
//! Handlers authenticate through the cookie session, parse path, query and
//! header input into domain types, and call the driving ports held in
//! [`state::HttpState`]. Domain errors render through [`error`].

pub mod balance;
pub mod error;
pub mod health;
pub mod idempotency;
pub mod redemptions;
pub mod rewards;
pub mod schemas;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;
mod validation;

pub use error::ApiResult;
