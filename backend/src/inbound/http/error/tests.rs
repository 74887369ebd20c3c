//! Tests for HTTP error mapping.

use super::*;
use actix_web::ResponseError;
use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

const TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

#[fixture]
fn expected_trace_id() -> String {
    TRACE_ID.to_owned()
}

#[rstest]
#[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
#[case(Error::invalid_user("who"), StatusCode::BAD_REQUEST)]
#[case(Error::invalid_reward("what"), StatusCode::BAD_REQUEST)]
#[case(Error::unauthorized("no auth"), StatusCode::UNAUTHORIZED)]
#[case(Error::insufficient_xp("short"), StatusCode::PAYMENT_REQUIRED)]
#[case(Error::out_of_stock("gone"), StatusCode::CONFLICT)]
#[case(Error::reward_unavailable("retired"), StatusCode::CONFLICT)]
#[case(Error::idempotency_conflict("reused"), StatusCode::CONFLICT)]
#[case(Error::redemption_failed("rolled back"), StatusCode::INTERNAL_SERVER_ERROR)]
#[case(
    Error::coupon_generation_failed("no code"),
    StatusCode::INTERNAL_SERVER_ERROR
)]
#[case(Error::redemption_timeout("slow"), StatusCode::INTERNAL_SERVER_ERROR)]
#[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
#[case(Error::service_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE)]
fn status_code_matches_error_code(#[case] error: Error, #[case] status: StatusCode) {
    assert_eq!(ResponseError::status_code(&error), status);
}

async fn body_of(error: &Error) -> (StatusCode, Option<String>, Value) {
    let response = ResponseError::error_response(error);
    let status = response.status();
    let header = response
        .headers()
        .get(TRACE_ID_HEADER)
        .map(|value| value.to_str().expect("ascii trace id").to_owned());
    let bytes = to_bytes(response.into_body())
        .await
        .expect("reading response body succeeds");
    let body = serde_json::from_slice(&bytes).expect("error JSON");
    (status, header, body)
}

#[rstest]
#[actix_web::test]
async fn business_rejections_keep_message_and_details(expected_trace_id: String) {
    let error = Error::insufficient_xp("insufficient XP to redeem this reward")
        .with_trace_id(expected_trace_id.clone())
        .with_details(json!({ "user_xp": 400, "reward_cost": 1000 }));

    let (status, header, body) = body_of(&error).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(header.as_deref(), Some(TRACE_ID));
    assert_eq!(body["error_code"], "INSUFFICIENT_XP");
    assert_eq!(body["error_message"], "insufficient XP to redeem this reward");
    assert_eq!(body["details"]["reward_cost"], 1000);
    assert_eq!(body["trace_id"], expected_trace_id);
}

#[rstest]
#[actix_web::test]
async fn internal_errors_are_redacted(expected_trace_id: String) {
    let error = Error::internal("connection string leaked")
        .with_trace_id(expected_trace_id)
        .with_details(json!({ "secret": "x" }));

    let (status, header, body) = body_of(&error).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header.as_deref(), Some(TRACE_ID));
    assert_eq!(body["error_code"], "INTERNAL_ERROR");
    assert_eq!(body["error_message"], "Internal server error");
    assert!(body.get("details").is_none());
}

#[rstest]
#[actix_web::test]
async fn transactional_failures_are_not_redacted() {
    let error = Error::redemption_timeout("redemption did not complete in time");

    let (status, header, body) = body_of(&error).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(header.is_none());
    assert_eq!(body["error_code"], "REDEMPTION_TIMEOUT");
    assert_eq!(body["error_message"], "redemption did not complete in time");
}

#[rstest]
fn actix_errors_become_opaque_internal_errors() {
    let actix = actix_web::error::ErrorBadGateway("upstream detail");
    let error = Error::from(actix);
    assert_eq!(error.code(), ErrorCode::InternalError);
    assert_eq!(error.message(), "Internal server error");
}
