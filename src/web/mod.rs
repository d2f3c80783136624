pub mod middleware;
pub mod routes;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::services::ArbitrationEngine;
use self::middleware::auth as auth_middleware;
use self::routes::{applications, hackathons, health, memberships, teams};

pub fn router(engine: ArbitrationEngine) -> Router {
    let protected_routes = Router::new()
        .route(
            "/hackathons",
            get(hackathons::list_handler).post(hackathons::create_handler),
        )
        .route("/hackathons/:hackathon_id", get(hackathons::detail_handler))
        .route(
            "/hackathons/:hackathon_id/applications",
            get(applications::list_for_hackathon_handler).post(applications::submit_handler),
        )
        .route(
            "/hackathons/:hackathon_id/applications/stats",
            get(applications::stats_handler),
        )
        .route("/hackathons/:hackathon_id/teams", get(teams::list_handler))
        .route("/applications/mine", get(applications::mine_handler))
        .route(
            "/applications/:application_id",
            get(applications::detail_handler),
        )
        .route(
            "/applications/:application_id/payment",
            post(applications::payment_handler),
        )
        .route(
            "/applications/:application_id/expire",
            post(applications::expire_handler),
        )
        .route(
            "/applications/:application_id/reject",
            post(applications::reject_handler),
        )
        .route("/teams", post(teams::create_handler))
        .route("/teams/mine", get(teams::mine_handler))
        .route("/teams/:team_id", get(teams::detail_handler))
        .route("/teams/:team_id/join", post(teams::join_handler))
        .route("/teams/:team_id/invitations", post(teams::invite_handler))
        .route("/teams/:team_id/requests", get(teams::requests_handler))
        .route("/memberships/mine", get(memberships::mine_handler))
        .route(
            "/memberships/:membership_id/decision",
            post(memberships::decision_handler),
        )
        .route(
            "/memberships/:membership_id/response",
            post(memberships::response_handler),
        )
        .route(
            "/memberships/:membership_id/leave",
            post(memberships::leave_handler),
        )
        .route(
            "/memberships/:membership_id/remove",
            post(memberships::remove_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            engine.clone(),
            auth_middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(protected_routes)
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CatchPanicLayer::new())
        .with_state(engine)
}
