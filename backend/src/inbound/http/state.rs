//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain driving ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    BalanceQuery, RedemptionCommand, RedemptionHistoryQuery, RewardCatalogQuery,
};

/// Dependency bundle for HTTP handlers.
///
/// Built once at startup from the domain services and cloned into every
/// Actix worker.
#[derive(Clone)]
pub struct HttpState {
    pub balance: Arc<dyn BalanceQuery>,
    pub catalog: Arc<dyn RewardCatalogQuery>,
    pub redemptions: Arc<dyn RedemptionCommand>,
    pub history: Arc<dyn RedemptionHistoryQuery>,
}

impl HttpState {
    /// Bundle the driving ports consumed by the handlers.
    pub fn new(
        balance: Arc<dyn BalanceQuery>,
        catalog: Arc<dyn RewardCatalogQuery>,
        redemptions: Arc<dyn RedemptionCommand>,
        history: Arc<dyn RedemptionHistoryQuery>,
    ) -> Self {
        Self {
            balance,
            catalog,
            redemptions,
            history,
        }
    }
}
