//! Router configuration.

use crate::handlers::{duel, health_check, live};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete Axum router.
///
/// - `GET /health`
/// - `POST /api/duels/:code/{start,next,resolve,answer}`
/// - `GET /api/duels/:code/snapshot`
/// - `GET /ws/duels/:code`
pub fn build_router(state: AppState) -> Router {
    let duel_routes = Router::new()
        .route("/:code/start", post(duel::start))
        .route("/:code/next", post(duel::next))
        .route("/:code/resolve", post(duel::resolve))
        .route("/:code/answer", post(duel::answer))
        .route("/:code/snapshot", get(duel::snapshot));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/duels", duel_routes)
        .route("/ws/duels/:code", get(live::connect))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
