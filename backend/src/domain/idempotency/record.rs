//! Stored idempotency records and lookup types.

use chrono::{DateTime, Utc};

use super::super::UserId;
use super::{IdempotencyKey, PayloadHash};

/// Stored record linking a key to its payload fingerprint and receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyRecord {
    pub key: IdempotencyKey,
    pub user_id: UserId,
    pub payload_hash: PayloadHash,
    /// Serialised receipt returned verbatim on replay.
    pub response_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Result of looking up an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyLookupResult {
    /// No record exists for this key.
    NotFound,
    /// A record exists and the payload hash matches.
    MatchingPayload(IdempotencyRecord),
    /// A record exists but was produced by a different payload.
    ConflictingPayload(IdempotencyRecord),
}

impl IdempotencyLookupResult {
    /// Classify a stored record against the fingerprint of the current request.
    pub fn classify(record: Option<IdempotencyRecord>, payload_hash: &PayloadHash) -> Self {
        match record {
            None => Self::NotFound,
            Some(record) if record.payload_hash == *payload_hash => Self::MatchingPayload(record),
            Some(record) => Self::ConflictingPayload(record),
        }
    }
}

/// Parameters for an idempotency lookup, scoped to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyLookupQuery {
    pub key: IdempotencyKey,
    pub user_id: UserId,
    pub payload_hash: PayloadHash,
}

impl IdempotencyLookupQuery {
    /// Create a new lookup query.
    pub const fn new(key: IdempotencyKey, user_id: UserId, payload_hash: PayloadHash) -> Self {
        Self {
            key,
            user_id,
            payload_hash,
        }
    }
}
