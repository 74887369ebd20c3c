//! Translation of driven-port errors into domain errors.

use crate::domain::Error;
use crate::domain::ports::{
    IdempotencyRepositoryError, RedemptionHistoryRepositoryError, RewardRepositoryError,
    XpLedgerRepositoryError,
};

pub(crate) fn map_ledger_error(error: XpLedgerRepositoryError) -> Error {
    match error {
        XpLedgerRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("xp ledger unavailable: {message}"))
        }
        XpLedgerRepositoryError::Query { message } => {
            Error::internal(format!("xp ledger error: {message}"))
        }
    }
}

pub(crate) fn map_reward_repository_error(error: RewardRepositoryError) -> Error {
    match error {
        RewardRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("reward repository unavailable: {message}"))
        }
        RewardRepositoryError::Query { message } => {
            Error::internal(format!("reward repository error: {message}"))
        }
    }
}

pub(crate) fn map_history_error(error: RedemptionHistoryRepositoryError) -> Error {
    match error {
        RedemptionHistoryRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("redemption history unavailable: {message}"))
        }
        RedemptionHistoryRepositoryError::Query { message } => {
            Error::internal(format!("redemption history error: {message}"))
        }
    }
}

pub(crate) fn map_idempotency_error(error: IdempotencyRepositoryError) -> Error {
    match error {
        IdempotencyRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("idempotency repository unavailable: {message}"))
        }
        IdempotencyRepositoryError::Query { message } => {
            Error::internal(format!("idempotency repository error: {message}"))
        }
        IdempotencyRepositoryError::Serialization { message } => Error::internal(format!(
            "idempotency repository serialization failed: {message}"
        )),
    }
}
