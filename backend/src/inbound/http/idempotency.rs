//! Parsing of the `Idempotency-Key` request header.

use actix_web::http::header::HeaderMap;

use crate::domain::{Error, IdempotencyKey, IdempotencyKeyValidationError};

/// HTTP header name for idempotency keys.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Extract the caller's idempotency key, if any.
///
/// An absent header is not an error: the redemption service derives a key
/// from the request coordinates instead.
///
/// # Errors
///
/// Returns `INVALID_REQUEST` when the header is present but is not a UUID.
pub fn extract_idempotency_key(headers: &HeaderMap) -> Result<Option<IdempotencyKey>, Error> {
    let Some(header_value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };

    let key = header_value
        .to_str()
        .map_err(|_| IdempotencyKeyValidationError::InvalidKey)
        .and_then(IdempotencyKey::new)
        .map_err(map_idempotency_key_error)?;
    Ok(Some(key))
}

fn map_idempotency_key_error(err: IdempotencyKeyValidationError) -> Error {
    let message = match err {
        IdempotencyKeyValidationError::EmptyKey => "idempotency-key header must not be empty",
        IdempotencyKeyValidationError::InvalidKey => "idempotency-key header must be a valid uuid",
    };
    Error::invalid_request(message).with_details(serde_json::json!({
        "field": IDEMPOTENCY_KEY_HEADER,
    }))
}
