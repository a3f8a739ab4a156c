//! Route definitions

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::AppState;

use super::api;
use super::files;

/// Screenshot uploads carry two full-resolution frames
const CAPTURE_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Create the main router: JSON API plus static files for everything else
pub fn create_router(app_state: Arc<AppState>, config: &HttpConfig) -> Router {
    let cors = if config.cors_enabled {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let api = Router::new()
        .route("/api/status", get(api::get_status))
        .route("/api/config", get(api::get_config))
        .route("/api/overlay", get(api::get_overlay))
        .route("/api/variants", get(api::list_variants))
        .route("/api/variants/:id/select", post(api::select_variant))
        .route("/api/session/start", post(api::start_session))
        .route("/api/session/stop", post(api::stop_session))
        .route("/api/session/mirror", post(api::toggle_mirror))
        .route("/api/session/facing", post(api::switch_facing))
        .route(
            "/api/capture",
            post(api::capture_screenshot).layer(DefaultBodyLimit::max(CAPTURE_BODY_LIMIT)),
        )
        // SSE stream for the front-end
        .route("/api/stream", get(api::overlay_stream))
        .layer(cors);

    api.merge(files::router(config.root.clone(), config.cors_enabled))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
