//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, HttpResponse, test, web};
use actix_http::Request;

use crate::domain::ports::{
    MockBalanceQuery, MockRedemptionCommand, MockRedemptionHistoryQuery, MockRewardCatalogQuery,
};
use crate::domain::{Error, UserId};
use crate::inbound::http::session::{SESSION_COOKIE_NAME, SessionContext};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{balance, redemptions, rewards};

/// Build a session middleware configured for tests.
///
/// - Generates a fresh signing/encryption key per invocation.
/// - Sets the cookie name to `session` and disables the `Secure` flag for
///   local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name(SESSION_COOKIE_NAME.to_owned())
        .cookie_secure(false)
        .build()
}

/// Mock driving ports; tests set expectations before calling [`Self::into_state`].
#[derive(Default)]
pub struct MockPorts {
    pub balance: MockBalanceQuery,
    pub catalog: MockRewardCatalogQuery,
    pub redemptions: MockRedemptionCommand,
    pub history: MockRedemptionHistoryQuery,
}

impl MockPorts {
    /// Wrap the mocks into handler state.
    pub fn into_state(self) -> HttpState {
        HttpState::new(
            Arc::new(self.balance),
            Arc::new(self.catalog),
            Arc::new(self.redemptions),
            Arc::new(self.history),
        )
    }
}

/// Initialise the ledger API with `state`, plus a `/test/login/{user_id}`
/// route standing in for the external authentication service.
pub async fn init_api(
    state: HttpState,
) -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .wrap(test_session_middleware())
            .app_data(web::Data::new(state))
            .route(
                "/test/login/{user_id}",
                web::get().to(
                    |session: SessionContext, user_id: web::Path<String>| async move {
                        let id = UserId::new(user_id.into_inner())
                            .map_err(|err| Error::invalid_request(err.to_string()))?;
                        session.persist_user(&id)?;
                        Ok::<_, Error>(HttpResponse::Ok().finish())
                    },
                ),
            )
            .service(
                web::scope("/api/v1")
                    .service(balance::get_balance)
                    .service(rewards::list_rewards)
                    .service(rewards::get_reward)
                    .service(rewards::validate_redemption)
                    .service(redemptions::redeem_reward)
                    .service(redemptions::list_redemptions),
            ),
    )
    .await
}

/// Sign `user_id` in and return the session cookie.
pub async fn login<S>(app: &S, user_id: &UserId) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let res = test::call_service(
        app,
        test::TestRequest::get()
            .uri(&format!("/test/login/{user_id}"))
            .to_request(),
    )
    .await;
    assert!(res.status().is_success(), "login route failed");
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie set")
        .into_owned()
}
