//! Tests for the redeem and history handlers.

use super::*;
use actix_web::http::StatusCode;
use actix_web::test;
use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::domain::{
    CouponCode, CouponStatus, IdempotencyKey, RedeemedReward, RedemptionId, RedemptionReceipt,
    RedemptionStatus, RewardId, UserId,
};
use crate::inbound::http::idempotency::IDEMPOTENCY_KEY_HEADER;
use crate::inbound::http::test_utils::{MockPorts, init_api, login};

const KEY: &str = "550e8400-e29b-41d4-a716-446655440000";

#[fixture]
fn outcome() -> RedemptionOutcome {
    RedemptionOutcome {
        receipt: RedemptionReceipt {
            redemption: RedeemedReward {
                id: RedemptionId::random(),
                status: RedemptionStatus::Approved,
                coupon_code: CouponCode::parse("K7QM-3XWP-9HRT-2BNV").expect("valid code"),
                expires_at: Utc
                    .with_ymd_and_hms(2026, 11, 17, 12, 0, 0)
                    .single()
                    .expect("valid timestamp"),
                reward_title: "Smoothie voucher".to_owned(),
            },
            user_xp_after: 500,
        },
        replayed: false,
    }
}

fn redeem_uri(reward_id: RewardId) -> String {
    format!("/api/v1/rewards/{reward_id}/redeem")
}

#[rstest]
#[actix_web::test]
async fn redeem_returns_the_receipt(outcome: RedemptionOutcome) {
    let user = UserId::random();
    let reward_id = RewardId::random();
    let expected_user = user.clone();
    let mut ports = MockPorts::default();
    ports
        .redemptions
        .expect_redeem()
        .withf(move |request| {
            request.user_id == expected_user
                && request.reward_id == reward_id
                && request.idempotency_key.is_none()
                && request.delivery_info.is_none()
        })
        .times(1)
        .returning(move |_| Ok(outcome.clone()));
    let app = init_api(ports.into_state()).await;
    let cookie = login(&app, &user).await;

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&redeem_uri(reward_id))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["user_xp_after"], 500);
    assert_eq!(body["replayed"], false);
    assert_eq!(body["redemption"]["status"], "approved");
    assert_eq!(body["redemption"]["coupon_code"], "K7QM-3XWP-9HRT-2BNV");
    assert_eq!(body["redemption"]["reward_title"], "Smoothie voucher");
    assert_eq!(body["redemption"]["expires_at"], "2026-11-17T12:00:00+00:00");
}

#[rstest]
#[actix_web::test]
async fn redeem_forwards_key_and_delivery_info(outcome: RedemptionOutcome) {
    let mut ports = MockPorts::default();
    ports
        .redemptions
        .expect_redeem()
        .withf(|request| {
            request.idempotency_key == Some(IdempotencyKey::new(KEY).expect("valid key"))
                && request
                    .delivery_info
                    .as_ref()
                    .and_then(|info| info.email.as_deref())
                    == Some("ada@example.test")
        })
        .times(1)
        .returning(move |_| {
            let mut replay = outcome.clone();
            replay.replayed = true;
            Ok(replay)
        });
    let app = init_api(ports.into_state()).await;
    let cookie = login(&app, &UserId::random()).await;

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&redeem_uri(RewardId::random()))
            .insert_header((IDEMPOTENCY_KEY_HEADER, KEY))
            .set_json(json!({ "delivery_info": { "email": "ada@example.test" } }))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["replayed"], true);
}

#[rstest]
#[case::bad_key(Some("not-a-uuid"), "{}")]
#[case::bad_body(None, "[1, 2")]
#[actix_web::test]
async fn malformed_requests_are_rejected_before_the_service(
    #[case] key: Option<&str>,
    #[case] body: &'static str,
) {
    let mut ports = MockPorts::default();
    ports.redemptions.expect_redeem().never();
    let app = init_api(ports.into_state()).await;
    let cookie = login(&app, &UserId::random()).await;

    let mut request = test::TestRequest::post()
        .uri(&redeem_uri(RewardId::random()))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .cookie(cookie);
    if let Some(key) = key {
        request = request.insert_header((IDEMPOTENCY_KEY_HEADER, key));
    }
    let res = test::call_service(&app, request.to_request()).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error_code"], "INVALID_REQUEST");
}

#[rstest]
#[case(Error::insufficient_xp("insufficient XP"), StatusCode::PAYMENT_REQUIRED, "INSUFFICIENT_XP")]
#[case(Error::out_of_stock("sold out"), StatusCode::CONFLICT, "OUT_OF_STOCK")]
#[case(
    Error::idempotency_conflict("key reused"),
    StatusCode::CONFLICT,
    "IDEMPOTENCY_CONFLICT"
)]
#[case(
    Error::redemption_failed("rolled back"),
    StatusCode::INTERNAL_SERVER_ERROR,
    "REDEMPTION_FAILED"
)]
#[case(
    Error::redemption_timeout("too slow"),
    StatusCode::INTERNAL_SERVER_ERROR,
    "REDEMPTION_TIMEOUT"
)]
#[actix_web::test]
async fn redeem_failures_map_to_statuses(
    #[case] error: Error,
    #[case] status: StatusCode,
    #[case] code: &str,
) {
    let mut ports = MockPorts::default();
    ports
        .redemptions
        .expect_redeem()
        .returning(move |_| Err(error.clone()));
    let app = init_api(ports.into_state()).await;
    let cookie = login(&app, &UserId::random()).await;

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&redeem_uri(RewardId::random()))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), status);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error_code"], code);
}

#[rstest]
#[actix_web::test]
async fn redeem_requires_a_session() {
    let mut ports = MockPorts::default();
    ports.redemptions.expect_redeem().never();
    let app = init_api(ports.into_state()).await;

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&redeem_uri(RewardId::random()))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

fn history_entry(sequence: i64) -> RedemptionHistoryEntry {
    RedemptionHistoryEntry {
        id: RedemptionId::random(),
        reward_id: RewardId::random(),
        reward_title: "Yoga class".to_owned(),
        reward_category: "physical".to_owned(),
        xp_spent: 500,
        status: RedemptionStatus::Approved,
        sequence,
        created_at: Utc
            .with_ymd_and_hms(2026, 10, 1, 9, 30, 0)
            .single()
            .expect("valid timestamp"),
        coupon_code: Some(CouponCode::parse("ABCD-EFGH-JKMN-PQRS").expect("valid code")),
        coupon_expires_at: None,
        coupon_status: Some(CouponStatus::Expired),
    }
}

#[rstest]
#[actix_web::test]
async fn history_passes_the_page_through() {
    let mut ports = MockPorts::default();
    ports
        .history
        .expect_list_redemptions()
        .withf(|_, page| page.limit == 2 && page.before == Some(118))
        .times(1)
        .returning(|_, _| Ok(vec![history_entry(117), history_entry(116)]));
    let app = init_api(ports.into_state()).await;
    let cookie = login(&app, &UserId::random()).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/users/me/redemptions?limit=2&before=118")
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    let items = body.as_array().expect("array body");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["sequence"], 117);
    assert_eq!(items[0]["coupon_status"], "expired");
    assert_eq!(items[0]["coupon_code"], "ABCD-EFGH-JKMN-PQRS");
}

#[rstest]
#[case("/api/v1/users/me/redemptions", HistoryPage::DEFAULT_LIMIT)]
#[case("/api/v1/users/me/redemptions?limit=5000", HistoryPage::MAX_LIMIT)]
#[case("/api/v1/users/me/redemptions?limit=0", 1)]
#[actix_web::test]
async fn history_limits_are_clamped(#[case] uri: &str, #[case] expected: u32) {
    let mut ports = MockPorts::default();
    ports
        .history
        .expect_list_redemptions()
        .withf(move |_, page| page.limit == expected && page.before.is_none())
        .times(1)
        .returning(|_, _| Ok(Vec::new()));
    let app = init_api(ports.into_state()).await;
    let cookie = login(&app, &UserId::random()).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri(uri).cookie(cookie).to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn history_rejects_malformed_cursors() {
    let mut ports = MockPorts::default();
    ports.history.expect_list_redemptions().never();
    let app = init_api(ports.into_state()).await;
    let cookie = login(&app, &UserId::random()).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/users/me/redemptions?before=yesterday")
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["details"]["field"], "before");
}
