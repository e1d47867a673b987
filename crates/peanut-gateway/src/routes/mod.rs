//! The `/api/v1` surface.

mod agents;
mod audit;
mod auth;
mod dispatch;
mod health;
mod vault;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the gateway router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Public
        .route("/health", get(health::liveness))
        .route("/auth/login", post(auth::login))
        .route("/auth/totp/verify", post(auth::totp_verify))
        // Session-gated
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/totp/setup", post(auth::totp_setup))
        .route("/auth/password", post(auth::change_password))
        .route("/agents", get(agents::list).post(agents::create))
        .route("/agents/{id}", put(agents::update).delete(agents::delete))
        .route("/agents/{id}/health", get(agents::probe))
        .route("/openclaw/dispatch", post(dispatch::dispatch))
        .route("/audit", get(audit::query))
        .route("/vault/status", get(vault::status))
        .route("/vault/config", get(vault::get_config).put(vault::put_config))
        .route("/vault/complete", post(vault::complete))
        .route("/vault/usage", get(vault::usage));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer for the configured origins, with credentials allowed
/// (the session cookie must travel).
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!(origin, "ignoring unparseable CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}
