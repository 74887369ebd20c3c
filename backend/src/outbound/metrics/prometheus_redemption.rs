//! Prometheus adapter for redemption outcome counts.
//!
//! The counter is registered with the same registry that backs the
//! `/metrics` endpoint, so it is exported alongside the HTTP metrics.

use async_trait::async_trait;
use prometheus::{IntCounterVec, Opts, Registry};

use crate::domain::ports::{RedemptionMetrics, RedemptionMetricsError, RedemptionOutcomeKind};

/// Prometheus-backed redemption metrics recorder.
///
/// # Metric Specification
///
/// - **Name**: `rewards_redemption_outcomes_total`
/// - **Type**: Counter
/// - **Labels**: `outcome`, one of [`RedemptionOutcomeKind::as_label`]
pub struct PrometheusRedemptionMetrics {
    outcomes_total: IntCounterVec,
}

impl PrometheusRedemptionMetrics {
    /// Create and register the counter with every outcome series at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let outcomes_total = IntCounterVec::new(
            Opts::new(
                "rewards_redemption_outcomes_total",
                "Redeem calls by terminal outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(outcomes_total.clone()))?;
        for outcome in RedemptionOutcomeKind::ALL {
            outcomes_total.with_label_values(&[outcome.as_label()]);
        }
        Ok(Self { outcomes_total })
    }
}

#[async_trait]
impl RedemptionMetrics for PrometheusRedemptionMetrics {
    async fn record_outcome(
        &self,
        outcome: RedemptionOutcomeKind,
    ) -> Result<(), RedemptionMetricsError> {
        self.outcomes_total
            .get_metric_with_label_values(&[outcome.as_label()])
            .map_err(|err| RedemptionMetricsError::export(err.to_string()))?
            .inc();
        Ok(())
    }
}
