pub mod health;
pub mod inbound;
pub mod sessions;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the gateway HTTP router (channel connector transport + ops).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/inbound/telegram", post(inbound::telegram))
        .route("/v1/inbound/slack", post(inbound::slack))
        .route("/v1/sessions", get(sessions::list))
        .route("/v1/sessions/stats", get(sessions::stats))
        .route("/v1/sessions/:key", delete(sessions::kill))
        .route("/v1/cron/deliveries", get(sessions::cron_deliveries))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
