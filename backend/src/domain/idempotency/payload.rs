//! Payload fingerprints for idempotency conflict detection.

use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const HASH_LEN: usize = 32;

/// Errors raised while building a [`PayloadHash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadHashError {
    /// Stored bytes had the wrong length.
    InvalidLength { expected: usize, actual: usize },
    /// The canonical payload could not be serialised.
    Serialization { message: String },
}

impl fmt::Display for PayloadHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { expected, actual } => {
                write!(f, "payload hash must be {expected} bytes, got {actual}")
            }
            Self::Serialization { message } => {
                write!(f, "failed to serialise canonical payload: {message}")
            }
        }
    }
}

impl std::error::Error for PayloadHashError {}

/// SHA-256 of a canonicalised request payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadHash([u8; HASH_LEN]);

impl PayloadHash {
    /// Rebuild a hash from stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadHashError::InvalidLength`] unless exactly 32 bytes are
    /// supplied.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, PayloadHashError> {
        let array: [u8; HASH_LEN] =
            bytes
                .try_into()
                .map_err(|_| PayloadHashError::InvalidLength {
                    expected: HASH_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    /// Raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Canonicalise a JSON value and hash it.
///
/// Object keys are sorted recursively and the result is serialised compactly,
/// so key order and whitespace never change the fingerprint.
///
/// ```
/// # use rewards_ledger::domain::canonicalize_and_hash;
/// # use serde_json::json;
/// let a = canonicalize_and_hash(&json!({"b": 2, "a": 1})).expect("hash a");
/// let b = canonicalize_and_hash(&json!({"a": 1, "b": 2})).expect("hash b");
/// assert_eq!(a, b);
/// ```
pub fn canonicalize_and_hash(value: &Value) -> Result<PayloadHash, PayloadHashError> {
    let bytes = serde_json::to_vec(&canonicalize(value)).map_err(|err| {
        PayloadHashError::Serialization {
            message: err.to_string(),
        }
    })?;
    Ok(PayloadHash(Sha256::digest(&bytes).into()))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(key, _)| key.as_str());
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key.clone(), canonicalize(inner)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
