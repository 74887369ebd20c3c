//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every ledger endpoint, the DTO schemas defined next
//! to the handlers, the domain error wrappers from
//! [`crate::inbound::http::schemas`], and the session cookie security scheme.
//! Swagger UI serves it in debug builds.

use crate::inbound::http::balance::{BalanceResponseBody, PillarBreakdownBody};
use crate::inbound::http::redemptions::{
    DeliveryInfoBody, RedeemRequestBody, RedeemResponseBody, RedeemedRewardBody,
    RedemptionHistoryBody,
};
use crate::inbound::http::rewards::{RewardResponseBody, ValidationResponseBody};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by the authentication service.",
            ))),
        );
    }
}

/// OpenAPI document for the rewards ledger API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Rewards ledger API",
        description = "XP balances, reward catalog and atomic coupon redemption."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::balance::get_balance,
        crate::inbound::http::rewards::list_rewards,
        crate::inbound::http::rewards::get_reward,
        crate::inbound::http::rewards::validate_redemption,
        crate::inbound::http::redemptions::redeem_reward,
        crate::inbound::http::redemptions::list_redemptions,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        BalanceResponseBody,
        PillarBreakdownBody,
        RewardResponseBody,
        ValidationResponseBody,
        RedeemRequestBody,
        DeliveryInfoBody,
        RedeemResponseBody,
        RedeemedRewardBody,
        RedemptionHistoryBody,
    )),
    tags(
        (name = "balance", description = "Derived XP balance"),
        (name = "rewards", description = "Reward catalog and eligibility checks"),
        (name = "redemptions", description = "Redeeming rewards and redemption history"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
