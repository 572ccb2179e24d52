//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Projects
        .route("/projects", get(handlers::list_projects))
        .route("/projects", post(handlers::create_project))
        // Environment variables
        .route("/env", get(handlers::list_env_vars))
        .route("/env", post(handlers::create_env_var))
        .route("/env/:id", delete(handlers::delete_env_var))
        .route("/env/import", post(handlers::import_env_vars))
        // Conflicts
        .route("/env/conflicts", get(handlers::scan_conflicts))
        .route("/env/conflicts/resolve", post(handlers::resolve_conflict));

    let mut router = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs.max(1),
        )))
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
