//! Redemption handlers.
//!
//! ```text
//! POST /api/v1/rewards/{reward_id}/redeem   Idempotency-Key: <uuid>
//! GET  /api/v1/users/me/redemptions?limit=20&before=118
//! ```

use actix_web::{HttpRequest, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    DeliveryInfo, Error, HistoryPage, RedeemRequest, RedemptionHistoryEntry, RedemptionOutcome,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::idempotency::extract_idempotency_key;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_optional_number, parse_reward_id};

/// Fulfilment details for physical rewards.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct DeliveryInfoBody {
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl From<DeliveryInfoBody> for DeliveryInfo {
    fn from(value: DeliveryInfoBody) -> Self {
        Self {
            address: value.address,
            email: value.email,
            phone: value.phone,
            notes: value.notes,
        }
    }
}

/// Optional request body for `POST /rewards/{reward_id}/redeem`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct RedeemRequestBody {
    pub delivery_info: Option<DeliveryInfoBody>,
}

/// Redemption summary in a receipt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedeemedRewardBody {
    #[schema(format = "uuid")]
    pub id: String,
    #[schema(example = "approved")]
    pub status: String,
    #[schema(example = "K7QM-3XWP-9HRT-2BNV")]
    pub coupon_code: String,
    #[schema(format = "date-time")]
    pub expires_at: String,
    pub reward_title: String,
}

/// Receipt returned by a successful or replayed redemption.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedeemResponseBody {
    pub redemption: RedeemedRewardBody,
    pub user_xp_after: u64,
    /// True when the receipt was committed by an earlier attempt with the
    /// same idempotency key.
    pub replayed: bool,
}

impl From<RedemptionOutcome> for RedeemResponseBody {
    fn from(outcome: RedemptionOutcome) -> Self {
        let receipt = outcome.receipt;
        let redemption = receipt.redemption;
        Self {
            redemption: RedeemedRewardBody {
                id: redemption.id.to_string(),
                status: redemption.status.as_str().to_owned(),
                coupon_code: redemption.coupon_code.as_str().to_owned(),
                expires_at: redemption.expires_at.to_rfc3339(),
                reward_title: redemption.reward_title,
            },
            user_xp_after: receipt.user_xp_after,
            replayed: outcome.replayed,
        }
    }
}

/// Query parameters for history paging.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HistoryQueryParams {
    /// Page size, 1 to 200; defaults to 50.
    #[param(value_type = Option<u32>)]
    pub limit: Option<String>,
    /// Only return entries with a smaller `sequence`.
    #[param(value_type = Option<i64>)]
    pub before: Option<String>,
}

impl HistoryQueryParams {
    fn into_page(self) -> Result<HistoryPage, Error> {
        let limit = parse_optional_number::<u32>(self.limit.as_deref(), FieldName::new("limit"))?;
        let before =
            parse_optional_number::<i64>(self.before.as_deref(), FieldName::new("before"))?;
        Ok(HistoryPage::new(limit, before))
    }
}

/// One history entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedemptionHistoryBody {
    #[schema(format = "uuid")]
    pub id: String,
    #[schema(format = "uuid")]
    pub reward_id: String,
    pub reward_title: String,
    pub reward_category: String,
    pub xp_spent: u64,
    #[schema(example = "approved")]
    pub status: String,
    /// Cursor for the next page.
    pub sequence: i64,
    #[schema(format = "date-time")]
    pub created_at: String,
    pub coupon_code: Option<String>,
    #[schema(format = "date-time")]
    pub coupon_expires_at: Option<String>,
    /// `valid`, `used` or `expired`, computed at read time.
    pub coupon_status: Option<String>,
}

impl From<RedemptionHistoryEntry> for RedemptionHistoryBody {
    fn from(entry: RedemptionHistoryEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            reward_id: entry.reward_id.to_string(),
            reward_title: entry.reward_title,
            reward_category: entry.reward_category,
            xp_spent: entry.xp_spent,
            status: entry.status.as_str().to_owned(),
            sequence: entry.sequence,
            created_at: entry.created_at.to_rfc3339(),
            coupon_code: entry.coupon_code.map(|code| code.as_str().to_owned()),
            coupon_expires_at: entry.coupon_expires_at.map(|at| at.to_rfc3339()),
            coupon_status: entry.coupon_status.map(|status| status.as_str().to_owned()),
        }
    }
}

fn parse_redeem_body(body: &[u8]) -> Result<RedeemRequestBody, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RedeemRequestBody::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        Error::invalid_request("request body must be a JSON object")
            .with_details(serde_json::json!({ "reason": err.to_string() }))
    })
}

/// Redeem a reward for the signed-in user.
///
/// Debits XP, records the redemption and issues a coupon atomically. Retrying
/// with the same `Idempotency-Key` replays the original receipt.
#[utoipa::path(
    post,
    path = "/api/v1/rewards/{reward_id}/redeem",
    params(
        ("reward_id" = String, Path, format = "uuid", description = "Reward identifier"),
        ("Idempotency-Key" = Option<String>, Header, format = "uuid",
            description = "Scopes retries of one logical redemption")
    ),
    request_body(
        content = RedeemRequestBody,
        content_type = "application/json",
        description = "Optional; an empty body is accepted"
    ),
    responses(
        (status = 200, description = "Reward redeemed", body = RedeemResponseBody),
        (status = 400, description = "Invalid request, user or reward", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 402, description = "Insufficient XP", body = ErrorSchema),
        (status = 409, description = "Out of stock, unavailable or key reused", body = ErrorSchema),
        (status = 500, description = "Redemption failed or timed out", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["redemptions"],
    operation_id = "redeemReward",
    security(("SessionCookie" = []))
)]
#[post("/rewards/{reward_id}/redeem")]
pub async fn redeem_reward(
    state: web::Data<HttpState>,
    session: SessionContext,
    request: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> ApiResult<web::Json<RedeemResponseBody>> {
    let user_id = session.require_user_id()?;
    let reward_id = parse_reward_id(&path)?;
    let idempotency_key = extract_idempotency_key(request.headers())?;
    let payload = parse_redeem_body(&body)?;

    let mut redeem = RedeemRequest::new(user_id, reward_id);
    if let Some(key) = idempotency_key {
        redeem = redeem.with_idempotency_key(key);
    }
    if let Some(info) = payload.delivery_info {
        redeem = redeem.with_delivery_info(info.into());
    }

    let outcome = state.redemptions.redeem(redeem).await?;
    Ok(web::Json(outcome.into()))
}

/// List the signed-in user's redemptions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/redemptions",
    params(HistoryQueryParams),
    responses(
        (status = 200, description = "Redemption history", body = [RedemptionHistoryBody]),
        (status = 400, description = "Invalid paging parameters", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["redemptions"],
    operation_id = "listRedemptions",
    security(("SessionCookie" = []))
)]
#[get("/users/me/redemptions")]
pub async fn list_redemptions(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<HistoryQueryParams>,
) -> ApiResult<web::Json<Vec<RedemptionHistoryBody>>> {
    let user_id = session.require_user_id()?;
    let page = query.into_inner().into_page()?;
    let entries = state.history.list_redemptions(&user_id, page).await?;
    Ok(web::Json(
        entries.into_iter().map(RedemptionHistoryBody::from).collect(),
    ))
}

#[cfg(test)]
#[path = "redemptions_tests.rs"]
mod tests;
