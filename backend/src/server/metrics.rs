//! Prometheus middleware and redemption counters.
//!
//! Compiled only with the `metrics` feature. The HTTP middleware exports
//! request metrics on `/metrics`; the redemption outcome counter is
//! registered on the same registry.

use std::sync::Arc;

use actix_service::{
    Service, ServiceExt as _, Transform,
    boxed::{self, BoxService},
};
use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Compat;
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use rewards_ledger::domain::ports::{NoOpRedemptionMetrics, RedemptionMetrics};
use rewards_ledger::outbound::metrics::PrometheusRedemptionMetrics;

const METRICS_NAMESPACE: &str = "rewards";
const METRICS_ENDPOINT: &str = "/metrics";

/// Build the Prometheus middleware, logging and returning `None` on failure.
pub(crate) fn initialize_metrics<F, E>(build: F) -> Option<PrometheusMetrics>
where
    F: FnOnce() -> Result<PrometheusMetrics, E>,
    E: std::fmt::Display,
{
    match build() {
        Ok(metrics) => Some(metrics),
        Err(error) => {
            warn!(error = %error, "Prometheus metrics disabled");
            None
        }
    }
}

/// Default middleware for the service namespace.
pub(crate) fn make_metrics() -> Option<PrometheusMetrics> {
    initialize_metrics(|| {
        PrometheusMetricsBuilder::new(METRICS_NAMESPACE)
            .endpoint(METRICS_ENDPOINT)
            .build()
    })
}

/// Redemption outcome recorder sharing the middleware registry.
///
/// Falls back to the no-op recorder when metrics are off or registration
/// fails.
pub(crate) fn redemption_metrics(
    prometheus: Option<&PrometheusMetrics>,
) -> Arc<dyn RedemptionMetrics> {
    let Some(prometheus) = prometheus else {
        return Arc::new(NoOpRedemptionMetrics);
    };
    match PrometheusRedemptionMetrics::new(&prometheus.registry) {
        Ok(metrics) => Arc::new(metrics),
        Err(error) => {
            warn!(error = %error, "redemption outcome counter registration failed");
            Arc::new(NoOpRedemptionMetrics)
        }
    }
}

/// Type-erased wrapper so the app has one type with or without metrics.
#[derive(Clone)]
pub(crate) enum MetricsLayer {
    Enabled(Arc<PrometheusMetrics>),
    Disabled,
}

impl MetricsLayer {
    #[must_use]
    pub(crate) fn from_option(metrics: Option<PrometheusMetrics>) -> Self {
        metrics.map_or(Self::Disabled, |metrics| Self::Enabled(Arc::new(metrics)))
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        match self {
            Self::Enabled(metrics) => {
                let fut = Compat::new((**metrics).clone()).new_transform(service);
                Box::pin(async move { Ok(boxed::service(fut.await?)) })
            }
            Self::Disabled => {
                let svc = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
                Box::pin(async move { Ok(boxed::service(svc)) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Tests for metrics initialisation.

    use super::*;
    use rewards_ledger::domain::ports::RedemptionOutcomeKind;
    use rstest::rstest;

    #[rstest]
    fn initialize_metrics_returns_none_on_error() {
        let metrics = initialize_metrics(|| -> Result<PrometheusMetrics, &str> { Err("boom") });
        assert!(metrics.is_none(), "expected metrics to be absent on error");
    }

    #[rstest]
    fn make_metrics_builds_the_middleware() {
        assert!(make_metrics().is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn redemption_counter_registers_on_the_middleware_registry() {
        let middleware = make_metrics().expect("metrics should build");
        let recorder = redemption_metrics(Some(&middleware));
        recorder
            .record_outcome(RedemptionOutcomeKind::Redeemed)
            .await
            .expect("record should succeed");

        let exposition = prometheus::TextEncoder::new()
            .encode_to_string(&middleware.registry.gather())
            .expect("metrics encode");
        assert!(exposition.contains("rewards_redemption_outcomes_total{outcome=\"redeemed\"} 1"));
    }

    #[rstest]
    #[tokio::test]
    async fn absent_middleware_uses_the_noop_recorder() {
        let recorder = redemption_metrics(None);
        assert!(
            recorder
                .record_outcome(RedemptionOutcomeKind::Failed)
                .await
                .is_ok()
        );
    }
}
