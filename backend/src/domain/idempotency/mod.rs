//! Idempotency primitives for safe redemption retries.
//!
//! - [`IdempotencyKey`]: caller-generated UUID sent via the `Idempotency-Key`
//!   header, or derived from `(user, reward, time bucket)` when absent.
//! - [`PayloadHash`]: SHA-256 of the canonical request payload, used to detect
//!   a key being reused for a different reward.
//! - [`IdempotencyRecord`]: stored receipt snapshot keyed by user and key.
//! - [`IdempotencyLookupResult`]: outcome of a lookup.
//! - [`IdempotencyConfig`]: retention window for stored records.

mod config;
mod key;
mod payload;
mod record;

pub use config::IdempotencyConfig;
pub use key::{IdempotencyKey, IdempotencyKeyValidationError};
pub use payload::{PayloadHash, PayloadHashError, canonicalize_and_hash};
pub use record::{IdempotencyLookupQuery, IdempotencyLookupResult, IdempotencyRecord};
