//! Balance API handler.
//!
//! ```text
//! GET /api/v1/users/me/balance
//! ```

use actix_web::{get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{PillarTotals, XpBalance};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// XP earned per wellness pillar.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PillarBreakdownBody {
    pub physical: u64,
    pub nutrition: u64,
    pub emotional: u64,
    pub spiritual: u64,
}

impl From<PillarTotals> for PillarBreakdownBody {
    fn from(value: PillarTotals) -> Self {
        Self {
            physical: value.physical,
            nutrition: value.nutrition,
            emotional: value.emotional,
            spiritual: value.spiritual,
        }
    }
}

/// Response payload for `GET /users/me/balance`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponseBody {
    /// Spendable XP: everything earned minus approved redemptions.
    #[schema(example = 1450)]
    pub xp_total: u64,
    pub xp_earned: u64,
    pub xp_spent: u64,
    pub level: u64,
    /// Progress toward the next level, 0 to 99.
    pub progress_pct: u8,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub xp_7d: u64,
    pub xp_30d: u64,
    pub pillars: PillarBreakdownBody,
}

impl From<XpBalance> for BalanceResponseBody {
    fn from(value: XpBalance) -> Self {
        Self {
            xp_total: value.xp_available,
            xp_earned: value.xp_earned,
            xp_spent: value.xp_spent,
            level: value.level,
            progress_pct: value.progress_pct,
            current_streak: value.current_streak,
            longest_streak: value.longest_streak,
            xp_7d: value.xp_7d,
            xp_30d: value.xp_30d,
            pillars: value.pillars.into(),
        }
    }
}

/// Spendable balance and activity statistics for the signed-in user.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/balance",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponseBody),
        (status = 400, description = "Unknown user", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["balance"],
    operation_id = "getBalance",
    security(("SessionCookie" = []))
)]
#[get("/users/me/balance")]
pub async fn get_balance(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<BalanceResponseBody>> {
    let user_id = session.require_user_id()?;
    let balance = state.balance.balance(&user_id).await?;
    Ok(web::Json(balance.into()))
}
