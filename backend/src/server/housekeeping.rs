//! Startup catalog seeding and the idempotency cleanup task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use rewards_ledger::domain::ports::{IdempotencyRepository, RewardRepository};
use rewards_ledger::domain::{CatalogService, Error, Reward};

/// Cadence of the idempotency cleanup task after its startup run.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Errors raised while seeding the reward catalog.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read catalog seed at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog seed at {path} is not a JSON array of rewards: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog seed rejected: {0}")]
    Rejected(#[from] Error),
}

/// Parse a catalog seed file.
pub fn load_catalog_seed(path: &Path) -> Result<Vec<Reward>, SeedError> {
    let bytes = std::fs::read(path).map_err(|source| SeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| SeedError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Upsert every reward in `path`, returning how many were written.
pub async fn seed_catalog(
    catalog: &CatalogService<dyn RewardRepository>,
    path: &Path,
) -> Result<usize, SeedError> {
    let rewards = load_catalog_seed(path)?;
    Ok(catalog.seed(&rewards).await?)
}

/// Delete expired idempotency records now and then every `interval`.
///
/// Failures are logged and retried on the next tick.
pub fn spawn_idempotency_cleanup(
    repository: Arc<dyn IdempotencyRepository>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match repository.cleanup_expired(ttl).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired idempotency records deleted"),
                Err(error) => warn!(error = %error, "idempotency cleanup failed"),
            }
        }
    })
}
