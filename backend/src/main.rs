//! Rewards service entry-point: loads settings, prepares storage, seeds the
//! catalog and serves the REST API.

mod server;

use std::sync::Arc;

use actix_web::web;
use color_eyre::eyre::{Result, WrapErr, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use rewards_ledger::inbound::http::health::HealthState;
use rewards_ledger::outbound::memory::MemoryLedger;
use rewards_ledger::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};

use server::housekeeping::{CLEANUP_INTERVAL, seed_catalog, spawn_idempotency_cleanup};
use server::session_key::{BuildMode, load_session_key};
use server::settings::AppSettings;
use server::state_builders::{LedgerPorts, ServicePolicies};
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load().map_err(|err| eyre!("failed to load settings: {err}"))?;
    let bind_addr = settings.bind_addr()?;
    let key = load_session_key(
        &settings.session_key_file(),
        BuildMode::from_debug_assertions(),
        settings.session_allow_ephemeral,
    )?;

    let ports = build_ports(&settings).await?;
    if let Some(path) = settings.catalog_seed_path.as_deref() {
        let written = seed_catalog(&ports.catalog(), path).await?;
        info!(path = %path.display(), written, "catalog seed applied");
    }

    let policies = ServicePolicies::from_settings(&settings);
    let _cleanup = spawn_idempotency_cleanup(
        Arc::clone(&ports.idempotency),
        policies.idempotency.ttl(),
        CLEANUP_INTERVAL,
    );

    let health_state = web::Data::new(HealthState::new());
    let config = ServerConfig::new(
        key,
        settings.cookie_secure(),
        bind_addr,
        ports,
        policies,
    );
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(server::metrics::make_metrics());

    info!(%bind_addr, "rewards service listening");
    let result = create_server(health_state.clone(), config)?.await;
    health_state.mark_unhealthy();
    result.wrap_err("HTTP server terminated with an error")
}

/// Connect to PostgreSQL and migrate, or fall back to the in-memory ledger.
async fn build_ports(settings: &AppSettings) -> Result<LedgerPorts> {
    let Some(database_url) = settings.database_url.clone() else {
        warn!("REWARDS_DATABASE_URL not set; using the in-memory ledger (state is lost on exit)");
        return Ok(LedgerPorts::memory(&MemoryLedger::new()));
    };

    let migration_url = database_url.clone();
    let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&migration_url))
        .await
        .wrap_err("migration task panicked")??;
    info!(applied, "database migrations applied");

    let pool = DbPool::new(
        PoolConfig::new(database_url)
            .with_max_size(settings.db_max_connections())
            .with_checkout_budget(settings.redemption_policy().timeout()),
    )
    .await?;
    Ok(LedgerPorts::diesel(&pool, settings))
}
