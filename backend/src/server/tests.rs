//! Tests for server construction, covering readiness signalling and the
//! routes mounted by `build_app`.

use super::state_builders::{LedgerPorts, ServicePolicies, build_http_state};
use super::{AppDependencies, ServerConfig, build_app, create_server};
use actix_web::cookie::{Key, SameSite};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use rewards_ledger::domain::ports::NoOpRedemptionMetrics;
use rewards_ledger::domain::{
    CouponPolicy, IdempotencyConfig, LevelCurve, RedemptionPolicy,
};
use rewards_ledger::inbound::http::health::HealthState;
use rewards_ledger::outbound::memory::MemoryLedger;
use rstest::{fixture, rstest};
use serde_json::Value;
use std::sync::Arc;

#[fixture]
fn health_state() -> web::Data<HealthState> {
    web::Data::new(HealthState::new())
}

#[fixture]
fn policies() -> ServicePolicies {
    ServicePolicies {
        level_curve: LevelCurve::default(),
        coupons: CouponPolicy::default(),
        idempotency: IdempotencyConfig::default(),
        redemption: RedemptionPolicy::default(),
    }
}

#[fixture]
fn memory_ports() -> LedgerPorts {
    LedgerPorts::memory(&MemoryLedger::new())
}

fn server_config(ports: LedgerPorts, policies: ServicePolicies) -> ServerConfig {
    ServerConfig::new(
        Key::generate(),
        false,
        "127.0.0.1:0".parse().expect("loopback address parses"),
        ports,
        policies,
    )
}

#[rstest]
#[actix_web::test]
async fn create_server_marks_ready(
    health_state: web::Data<HealthState>,
    memory_ports: LedgerPorts,
    policies: ServicePolicies,
) {
    assert!(!health_state.is_ready(), "state should start unready");

    let _server = create_server(health_state.clone(), server_config(memory_ports, policies))
        .expect("server should build");

    assert!(
        health_state.is_ready(),
        "server creation should mark readiness"
    );
}

#[cfg(feature = "metrics")]
#[rstest]
#[actix_web::test]
async fn create_server_marks_ready_with_metrics(
    health_state: web::Data<HealthState>,
    memory_ports: LedgerPorts,
    policies: ServicePolicies,
) {
    let config = server_config(memory_ports, policies).with_metrics(super::metrics::make_metrics());

    let _server = create_server(health_state.clone(), config).expect("server should build");

    assert!(health_state.is_ready());
}

#[rstest]
#[actix_web::test]
async fn app_mounts_probes_and_guards_the_api(
    health_state: web::Data<HealthState>,
    memory_ports: LedgerPorts,
    policies: ServicePolicies,
) {
    health_state.mark_ready();
    let http_state = build_http_state(&memory_ports, policies, Arc::new(NoOpRedemptionMetrics));
    let app = test::init_service(build_app(AppDependencies {
        health_state,
        http_state: web::Data::new(http_state),
        key: Key::generate(),
        cookie_secure: false,
        same_site: SameSite::Lax,
    }))
    .await;

    let ready = test::call_service(&app, test::TestRequest::get().uri("/health/ready").to_request())
        .await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert!(ready.headers().contains_key("trace-id"));

    let balance = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/users/me/balance")
            .to_request(),
    )
    .await;
    assert_eq!(balance.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(balance).await;
    assert_eq!(body["error_code"], "UNAUTHORIZED");
    assert!(body["trace_id"].is_string());
}

#[cfg(debug_assertions)]
#[rstest]
#[actix_web::test]
async fn debug_builds_serve_the_openapi_document(
    health_state: web::Data<HealthState>,
    memory_ports: LedgerPorts,
    policies: ServicePolicies,
) {
    let http_state = build_http_state(&memory_ports, policies, Arc::new(NoOpRedemptionMetrics));
    let app = test::init_service(build_app(AppDependencies {
        health_state,
        http_state: web::Data::new(http_state),
        key: Key::generate(),
        cookie_secure: false,
        same_site: SameSite::Lax,
    }))
    .await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api-docs/openapi.json")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert!(body["paths"]["/api/v1/rewards/{reward_id}/redeem"].is_object());
}
