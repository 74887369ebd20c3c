//! Reward catalog and eligibility handlers.
//!
//! ```text
//! GET  /api/v1/rewards?category=nutrition
//! GET  /api/v1/rewards/{reward_id}
//! POST /api/v1/rewards/{reward_id}/validate
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::RewardFilter;
use crate::domain::{RedemptionCheck, RewardListing, StockLevel};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::parse_reward_id;

/// Query parameters for the catalog listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RewardListQuery {
    /// Only list rewards in this category.
    pub category: Option<String>,
}

impl RewardListQuery {
    fn into_filter(self) -> RewardFilter {
        match self.category {
            Some(category) if !category.trim().is_empty() => {
                RewardFilter::category(category.trim())
            }
            _ => RewardFilter::default(),
        }
    }
}

/// Catalog entry as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RewardResponseBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub partner_name: Option<String>,
    pub image_url: Option<String>,
    pub xp_cost: u64,
    pub is_active: bool,
    /// Units left; `null` when the reward is unlimited.
    pub available_stock: Option<u64>,
}

impl From<RewardListing> for RewardResponseBody {
    fn from(listing: RewardListing) -> Self {
        let available_stock = listing.available_stock().as_option();
        let reward = listing.reward;
        Self {
            id: reward.id.to_string(),
            title: reward.title,
            description: reward.description,
            category: reward.category,
            partner_name: reward.partner_name,
            image_url: reward.image_url,
            xp_cost: reward.xp_cost,
            is_active: reward.is_active,
            available_stock,
        }
    }
}

/// Advisory verdict for one user and reward.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidationResponseBody {
    pub is_valid: bool,
    /// Error code the redeem call would currently fail with.
    #[schema(example = "INSUFFICIENT_XP")]
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub user_xp: u64,
    pub reward_cost: Option<u64>,
    /// Units left; `null` when unlimited or when the reward is unknown.
    pub available_stock: Option<u64>,
}

impl From<RedemptionCheck> for ValidationResponseBody {
    fn from(check: RedemptionCheck) -> Self {
        let error = check.to_error();
        Self {
            is_valid: check.is_valid(),
            error_code: error.as_ref().map(|err| err.code().as_str().to_owned()),
            error_message: error.map(|err| err.message().to_owned()),
            user_xp: check.user_xp,
            reward_cost: check.reward_cost,
            available_stock: check.available_stock.and_then(StockLevel::as_option),
        }
    }
}

/// List active rewards, cheapest first.
#[utoipa::path(
    get,
    path = "/api/v1/rewards",
    params(RewardListQuery),
    responses(
        (status = 200, description = "Active rewards", body = [RewardResponseBody]),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["rewards"],
    operation_id = "listRewards",
    security(("SessionCookie" = []))
)]
#[get("/rewards")]
pub async fn list_rewards(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<RewardListQuery>,
) -> ApiResult<web::Json<Vec<RewardResponseBody>>> {
    session.require_user_id()?;
    let listings = state
        .catalog
        .list_active(&query.into_inner().into_filter())
        .await?;
    Ok(web::Json(
        listings.into_iter().map(RewardResponseBody::from).collect(),
    ))
}

/// Fetch one reward, including inactive ones.
#[utoipa::path(
    get,
    path = "/api/v1/rewards/{reward_id}",
    params(("reward_id" = String, Path, format = "uuid", description = "Reward identifier")),
    responses(
        (status = 200, description = "Reward", body = RewardResponseBody),
        (status = 400, description = "Unknown or malformed reward id", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema)
    ),
    tags = ["rewards"],
    operation_id = "getReward",
    security(("SessionCookie" = []))
)]
#[get("/rewards/{reward_id}")]
pub async fn get_reward(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<RewardResponseBody>> {
    session.require_user_id()?;
    let reward_id = parse_reward_id(&path)?;
    let listing = state.catalog.get_reward(&reward_id).await?;
    Ok(web::Json(listing.into()))
}

/// Check whether the signed-in user could redeem a reward right now.
///
/// Business-rule failures are reported in the body with `200 OK`; the check
/// takes no locks, so a later redeem may still fail.
#[utoipa::path(
    post,
    path = "/api/v1/rewards/{reward_id}/validate",
    params(("reward_id" = String, Path, format = "uuid", description = "Reward identifier")),
    responses(
        (status = 200, description = "Eligibility verdict", body = ValidationResponseBody),
        (status = 400, description = "Unknown user or malformed reward id", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema)
    ),
    tags = ["rewards"],
    operation_id = "validateRedemption",
    security(("SessionCookie" = []))
)]
#[post("/rewards/{reward_id}/validate")]
pub async fn validate_redemption(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<ValidationResponseBody>> {
    let user_id = session.require_user_id()?;
    let reward_id = parse_reward_id(&path)?;
    let check = state.redemptions.validate(&user_id, &reward_id).await?;
    Ok(web::Json(check.into()))
}

#[cfg(test)]
#[path = "rewards_tests.rs"]
mod tests;
