//! Prometheus-backed implementations of domain metrics ports.
//!
//! Compiled only with the `metrics` feature.

mod prometheus_redemption;

pub use prometheus_redemption::PrometheusRedemptionMetrics;
