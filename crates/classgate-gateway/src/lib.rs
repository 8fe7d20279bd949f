pub mod config;
pub mod cookies;
pub mod errors;
pub mod metrics;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

pub use config::GatewayConfig;
pub use errors::ApiError;
pub use state::AppState;

use crate::metrics::metrics_middleware;
use crate::routes::{chat, credits, history, lti, ops, quota, speaking};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(ops::health))
        .route("/version", get(ops::version))
        .route("/metrics", get(ops::metrics))
        .route("/api/lti/login", get(lti::login_get).post(lti::login_post))
        .route("/api/lti/launch", post(lti::launch))
        .route("/api/lti/deeplink", post(lti::deep_link))
        .route("/api/lti/jwks", get(lti::jwks))
        .route("/api/quota", get(quota::message_quota))
        .route("/api/speaking-quota", get(quota::speaking_quota))
        .route("/api/credits/add", post(credits::add))
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/speaking",
            post(speaking::speaking).layer(DefaultBodyLimit::max(speaking::SPEAKING_BODY_LIMIT)),
        )
        .route("/api/history", get(history::list).delete(history::clear))
        .route_layer(from_fn_with_state(state.clone(), metrics_middleware))
        .with_state(state)
}
