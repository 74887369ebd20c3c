//! Idempotency key validation and derivation.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for keys derived from request coordinates.
const DERIVED_KEY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1e_2c0a_9b7d_4e5f_a3c8_1d2e_3f4a_5b6c);

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyKeyValidationError {
    /// The key string was empty.
    EmptyKey,
    /// The key string was not a valid UUID.
    InvalidKey,
}

impl fmt::Display for IdempotencyKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "idempotency key must not be empty"),
            Self::InvalidKey => write!(f, "idempotency key must be a valid UUID"),
        }
    }
}

impl std::error::Error for IdempotencyKeyValidationError {}

/// Idempotency key scoping one logical redemption attempt.
///
/// # Example
///
/// ```
/// # use rewards_ledger::domain::IdempotencyKey;
/// let key = IdempotencyKey::new("550e8400-e29b-41d4-a716-446655440000")
///     .expect("valid UUID");
/// assert_eq!(key.as_ref(), "550e8400-e29b-41d4-a716-446655440000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(Uuid, String);

impl IdempotencyKey {
    /// Validate and construct an [`IdempotencyKey`] from a string.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyKeyValidationError::EmptyKey`] for empty input and
    /// [`IdempotencyKeyValidationError::InvalidKey`] for anything that is not
    /// a UUID without surrounding whitespace.
    pub fn new(key: impl AsRef<str>) -> Result<Self, IdempotencyKeyValidationError> {
        Self::from_owned(key.as_ref().to_owned())
    }

    /// Construct an [`IdempotencyKey`] directly from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid, uuid.to_string())
    }

    /// Generate a new random [`IdempotencyKey`].
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Derive a deterministic key for callers that did not supply one.
    ///
    /// Requests from the same user for the same reward inside the same time
    /// bucket collapse onto one key, so a blind retry replays rather than
    /// debiting twice.
    ///
    /// ```
    /// # use rewards_ledger::domain::IdempotencyKey;
    /// let a = IdempotencyKey::derive(&["user", "reward", "42"]);
    /// let b = IdempotencyKey::derive(&["user", "reward", "42"]);
    /// let c = IdempotencyKey::derive(&["user", "reward", "43"]);
    /// assert_eq!(a, b);
    /// assert_ne!(a, c);
    /// ```
    pub fn derive(parts: &[&str]) -> Self {
        let name = parts.join(":");
        Self::from_uuid(Uuid::new_v5(&DERIVED_KEY_NAMESPACE, name.as_bytes()))
    }

    fn from_owned(key: String) -> Result<Self, IdempotencyKeyValidationError> {
        if key.is_empty() {
            return Err(IdempotencyKeyValidationError::EmptyKey);
        }
        if key.trim() != key {
            return Err(IdempotencyKeyValidationError::InvalidKey);
        }
        let parsed =
            Uuid::parse_str(&key).map_err(|_| IdempotencyKeyValidationError::InvalidKey)?;
        Ok(Self(parsed, key))
    }

    /// Access the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.1
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}
