//! Shared validation helpers for inbound HTTP adapters.
//!
//! Path and query values arrive as strings so malformed input is reported
//! with the ledger's JSON error body instead of Actix's plain-text default.

use std::str::FromStr;

use serde_json::json;

use crate::domain::{Error, RewardId};

/// Validation error codes carried in `details.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValidationCode {
    InvalidUuid,
    InvalidNumber,
}

impl ValidationCode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUuid => "invalid_uuid",
            Self::InvalidNumber => "invalid_number",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    const fn as_str(self) -> &'static str {
        self.0
    }
}

fn details(field: FieldName, code: ValidationCode, value: &str) -> serde_json::Value {
    json!({
        "field": field.as_str(),
        "value": value,
        "code": code.as_str(),
    })
}

/// Parse a reward identifier from a path segment.
///
/// A malformed id can never name a catalog entry, so it is reported as
/// `INVALID_REWARD` rather than a generic request error.
pub(crate) fn parse_reward_id(value: &str) -> Result<RewardId, Error> {
    let field = FieldName::new("reward_id");
    RewardId::new(value).map_err(|_| {
        Error::invalid_reward(format!("{} must be a valid UUID", field.as_str()))
            .with_details(details(field, ValidationCode::InvalidUuid, value))
    })
}

/// Parse an optional numeric query parameter.
pub(crate) fn parse_optional_number<T: FromStr>(
    value: Option<&str>,
    field: FieldName,
) -> Result<Option<T>, Error> {
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                Error::invalid_request(format!("{} must be a non-negative integer", field.as_str()))
                    .with_details(details(field, ValidationCode::InvalidNumber, raw))
            })
        })
        .transpose()
}
