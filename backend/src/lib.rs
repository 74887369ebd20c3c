//! XP ledger and reward redemption engine.
//!
//! - [`domain`]: balance derivation, catalog rules and the atomic redemption
//!   orchestrator, reachable only through [`domain::ports`].
//! - [`inbound`]: Actix HTTP adapter.
//! - [`outbound`]: PostgreSQL, in-memory and Prometheus adapters.
//! - [`middleware`]: request tracing.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
