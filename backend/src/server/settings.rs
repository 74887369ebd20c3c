//! Application settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `REWARDS_*` environment variables and an
//! optional config file. Accessors fall back to the documented defaults and
//! convert raw numbers into the policy types the domain expects.

use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use rewards_ledger::domain::{CouponPolicy, IdempotencyConfig, LevelCurve, RedemptionPolicy};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_SESSION_KEY_FILE: &str = "/var/run/secrets/session_key";
const DEFAULT_COUPON_VALIDITY_DAYS: u32 = 30;
const DEFAULT_COUPON_MAX_ATTEMPTS: u8 = 5;
const DEFAULT_REDEMPTION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CONTENTION_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;
const DEFAULT_IDEMPOTENCY_TTL_HOURS: u64 = 24;
const DEFAULT_IDEMPOTENCY_BUCKET_SECS: u64 = 30;

/// Errors raised while interpreting loaded settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The bind address does not parse as `host:port`.
    #[error("invalid bind address '{value}': {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Runtime configuration for the rewards service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "REWARDS")]
pub struct AppSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection string; the in-memory ledger is used when unset.
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections.
    pub db_max_connections: Option<u32>,
    /// File holding the cookie session key material.
    pub session_key_file: Option<PathBuf>,
    /// Permit a generated session key when the key file cannot be read.
    #[ortho_config(default = false)]
    pub session_allow_ephemeral: bool,
    /// Mark session cookies `Secure`; defaults to true.
    pub cookie_secure: Option<bool>,
    /// Days a freshly issued coupon stays valid.
    pub coupon_validity_days: Option<u32>,
    /// Code generation attempts before a redemption is cancelled.
    pub coupon_max_attempts: Option<u8>,
    /// XP needed per level; defaults to 1000.
    pub xp_per_level: Option<u64>,
    /// Budget for one redeem call, in milliseconds.
    pub redemption_timeout_ms: Option<u64>,
    /// PostgreSQL `lock_timeout` for redemption transactions, in milliseconds.
    pub lock_timeout_ms: Option<u64>,
    /// Retries after lock contention.
    pub contention_retries: Option<u32>,
    /// Base backoff between contention retries, in milliseconds.
    pub retry_backoff_ms: Option<u64>,
    /// Hours an idempotency record is kept.
    pub idempotency_ttl_hours: Option<u64>,
    /// Width of the time bucket used to derive keys for keyless requests.
    pub idempotency_bucket_secs: Option<u64>,
    /// JSON file of rewards upserted at startup.
    pub catalog_seed_path: Option<PathBuf>,
}

impl AppSettings {
    /// Parsed bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|source| SettingsError::BindAddr {
            value: raw.to_owned(),
            source,
        })
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .max(1)
    }

    pub fn session_key_file(&self) -> PathBuf {
        self.session_key_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_KEY_FILE))
    }

    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure.unwrap_or(true)
    }

    /// Coupon validity and generation retry bounds.
    pub fn coupon_policy(&self) -> CouponPolicy {
        CouponPolicy::new(
            self.coupon_validity_days
                .unwrap_or(DEFAULT_COUPON_VALIDITY_DAYS),
            self.coupon_max_attempts
                .unwrap_or(DEFAULT_COUPON_MAX_ATTEMPTS),
        )
    }

    /// Level curve; a zero setting falls back to the default step.
    pub fn level_curve(&self) -> LevelCurve {
        self.xp_per_level
            .and_then(NonZeroU64::new)
            .map_or_else(LevelCurve::default, LevelCurve::new)
    }

    pub fn redemption_policy(&self) -> RedemptionPolicy {
        RedemptionPolicy::new(
            Duration::from_millis(
                self.redemption_timeout_ms
                    .unwrap_or(DEFAULT_REDEMPTION_TIMEOUT_MS),
            ),
            self.contention_retries
                .unwrap_or(DEFAULT_CONTENTION_RETRIES),
            Duration::from_millis(self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS)),
        )
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms.unwrap_or(DEFAULT_LOCK_TIMEOUT_MS))
    }

    /// Idempotency retention, clamped to between one hour and ten years.
    pub fn idempotency_config(&self) -> IdempotencyConfig {
        IdempotencyConfig::from_hours(
            self.idempotency_ttl_hours
                .unwrap_or(DEFAULT_IDEMPOTENCY_TTL_HOURS),
        )
        .with_derived_key_bucket(Duration::from_secs(
            self.idempotency_bucket_secs
                .unwrap_or(DEFAULT_IDEMPOTENCY_BUCKET_SECS),
        ))
    }
}
